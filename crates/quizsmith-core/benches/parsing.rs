use criterion::{black_box, criterion_group, criterion_main, Criterion};

use quizsmith_core::parser::{extract_options, parse_quiz};

fn generate_response(n: usize) -> String {
    let mut s = String::from("Here is your quiz.\n\n");
    for i in 1..=n {
        s.push_str(&format!(
            "Q{i}. Which statement about concept {i} is correct?\n\
             a) The first candidate answer for {i}\n\
             b) The second candidate answer for {i}\n\
             c) The third candidate answer for {i}\n\
             d) The fourth candidate answer for {i}\n\n"
        ));
    }
    s.push_str("Answer Key:\n");
    for i in 1..=n {
        let letter = ['a', 'b', 'c', 'd'][i % 4];
        s.push_str(&format!("{i}. {letter}\n"));
    }
    s
}

fn bench_parse_quiz(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_quiz");

    let small = generate_response(5);
    let full = generate_response(20);
    // Model returned fewer questions than requested
    let partial = generate_response(12);

    group.bench_function("5_questions", |b| {
        b.iter(|| parse_quiz(black_box(&small), black_box(5)))
    });

    group.bench_function("20_questions", |b| {
        b.iter(|| parse_quiz(black_box(&full), black_box(20)))
    });

    group.bench_function("12_of_20_questions", |b| {
        b.iter(|| parse_quiz(black_box(&partial), black_box(20)))
    });

    group.finish();
}

fn bench_extract_options(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_options");

    let lines = "What is osmosis?\na) one\nb) two\nc) three\nd) four";
    let inline = "What is osmosis? a) one b) two c) three d) four";
    let no_options = "Explain osmosis in your own words.";

    group.bench_function("one_per_line", |b| {
        b.iter(|| extract_options(black_box(lines)))
    });

    group.bench_function("inline", |b| b.iter(|| extract_options(black_box(inline))));

    group.bench_function("no_options", |b| {
        b.iter(|| extract_options(black_box(no_options)))
    });

    group.finish();
}

criterion_group!(benches, bench_parse_quiz, bench_extract_options);
criterion_main!(benches);
