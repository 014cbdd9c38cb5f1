use lined_code::line_offset::{
    child_from_line_offset, first_character_index, line_offset, point_for_line_offset,
};
use lined_code::{CodeBlockOptions, Document, NodeId, Point, PointKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALPHABET: &[char] = &['a', 'b', ' ', '\t', '(', '"', '中', 'é', '1', '='];

fn random_text(rng: &mut StdRng, max_len: usize) -> String {
    let len = rng.gen_range(1..=max_len);
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
        .collect()
}

/// A line built from raw runs (not tokenizer output), so run boundaries are arbitrary.
fn line_with_runs(doc: &mut Document, runs: &[String]) -> NodeId {
    let block = doc.create_code_block(&CodeBlockOptions::default());
    doc.append(doc.root(), block).unwrap();
    let line = doc.first_child(block).unwrap();
    for text in runs {
        let run = doc.create_code_run(text.clone(), None);
        doc.append(line, run).unwrap();
    }
    line
}

#[test]
fn test_offset_round_trip_random_lines() {
    let mut rng = StdRng::seed_from_u64(0x0ff5e7);
    let mut doc = Document::new();

    for _ in 0..200 {
        let run_count = rng.gen_range(0..6);
        let runs: Vec<String> = (0..run_count).map(|_| random_text(&mut rng, 5)).collect();
        let line = line_with_runs(&mut doc, &runs);
        let len = doc.text_len(line);

        for offset in 0..=len {
            let point = point_for_line_offset(&doc, line, offset);
            assert_eq!(
                line_offset(&doc, &point),
                Some(offset),
                "runs {runs:?}, offset {offset}"
            );
        }
    }
}

#[test]
fn test_every_tree_point_maps_back_to_its_offset() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut doc = Document::new();

    for _ in 0..100 {
        let runs: Vec<String> = (0..rng.gen_range(1..5))
            .map(|_| random_text(&mut rng, 4))
            .collect();
        let line = line_with_runs(&mut doc, &runs);

        for &run in doc.children(line) {
            for intra in 0..=doc.text_len(run) {
                let offset = line_offset(&doc, &Point::text(run, intra)).unwrap();
                let found = child_from_line_offset(&doc, line, offset).unwrap();
                let back = line_offset(&doc, &Point::text(found.run, found.offset));
                assert_eq!(back, Some(offset));
            }
        }
    }
}

#[test]
fn test_empty_line_uses_element_point() {
    let mut doc = Document::new();
    let line = line_with_runs(&mut doc, &[]);

    let point = point_for_line_offset(&doc, line, 0);
    assert_eq!(point.kind, PointKind::Element);
    assert_eq!(point.node, line);
    assert_eq!(line_offset(&doc, &point), Some(0));
    assert_eq!(first_character_index(&doc, line, None), 0);
}

#[test]
fn test_points_outside_code_have_no_line_offset() {
    let mut doc = Document::new();
    let paragraph = doc.create_paragraph();
    let text = doc.create_text("hello");
    doc.append(paragraph, text).unwrap();
    doc.append(doc.root(), paragraph).unwrap();

    assert_eq!(line_offset(&doc, &Point::text(text, 2)), None);
    assert_eq!(line_offset(&doc, &Point::element(paragraph, 0)), None);
}

#[test]
fn test_multibyte_offsets_count_chars() {
    let mut doc = Document::new();
    let line = line_with_runs(&mut doc, &["中文".to_string(), "é!".to_string()]);
    let runs = doc.children(line).to_vec();

    assert_eq!(doc.text_len(line), 4);
    assert_eq!(point_for_line_offset(&doc, line, 3), Point::text(runs[1], 1));
    assert_eq!(line_offset(&doc, &Point::text(runs[1], 2)), Some(4));
}
