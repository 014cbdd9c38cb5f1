use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use lined_code::line_offset::select_line_offset;
use lined_code::reconcile::{code_block_from_text, is_line_current, update_every_line};
use lined_code::{CodeBlockOptions, Command, CommandExecutor, Document, EditCommand, NodeId};

fn source(line_count: usize) -> String {
    let mut out = String::with_capacity(line_count * 48);
    for i in 0..line_count {
        out.push_str(&format!(
            "\tconst value{i} = compute(\"line {i}\", {i}); // benchmark\n"
        ));
    }
    out.pop();
    out
}

fn block_document(line_count: usize) -> (Document, NodeId) {
    let mut doc = Document::new();
    let block =
        code_block_from_text(&mut doc, &CodeBlockOptions::with_language("js"), &source(line_count))
            .unwrap();
    doc.append(doc.root(), block).unwrap();
    (doc, block)
}

fn bench_block_from_text(c: &mut Criterion) {
    let text = source(1_000);
    c.bench_function("block_from_text/1k_lines", |b| {
        b.iter(|| {
            let mut doc = Document::new();
            let block =
                code_block_from_text(&mut doc, &CodeBlockOptions::with_language("js"), &text)
                    .unwrap();
            black_box(doc.child_count(block));
        })
    });
}

fn bench_staleness_check(c: &mut Criterion) {
    let (doc, block) = block_document(1_000);
    c.bench_function("is_line_current/1k_lines", |b| {
        b.iter(|| {
            let current = doc
                .children(block)
                .iter()
                .filter(|&&line| is_line_current(&doc, line).unwrap())
                .count();
            black_box(current);
        })
    });
}

fn bench_rebuild_every_line(c: &mut Criterion) {
    c.bench_function("update_every_line/1k_lines", |b| {
        b.iter_batched(
            || block_document(1_000),
            |(mut doc, block)| {
                black_box(update_every_line(&mut doc, block).unwrap());
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_shift_lines(c: &mut Criterion) {
    c.bench_function("move_lines_down/100_moves", |b| {
        b.iter_batched(
            || {
                let (mut doc, block) = block_document(200);
                let first = doc.first_child(block).unwrap();
                select_line_offset(&mut doc, first, 3);
                CommandExecutor::new(doc)
            },
            |mut executor| {
                for _ in 0..100 {
                    executor
                        .execute(Command::Edit(EditCommand::MoveLinesDown))
                        .unwrap();
                }
                black_box(executor.get_command_history().len());
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_block_from_text,
    bench_staleness_check,
    bench_rebuild_every_line,
    bench_shift_lines
);
criterion_main!(benches);
