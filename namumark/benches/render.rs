#![allow(
  clippy::expect_used,
  clippy::unwrap_used,
  reason = "Fine in benchmarks"
)]
use std::{hint::black_box, sync::Arc};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use namumark::{
  DocumentRef,
  MarkupOptions,
  MarkupProcessor,
  MemoryLookup,
  RenderRequest,
  process_batch,
};

const DOC_SMALL: &str = "= 개요 =
'''나무마크'''는 위키 문법이다. [[문서]]와 [[분류:문법]]을 지원한다.[* 각주 예시]
";

const DOC_LARGE: &str = r#"= 개요 =
[목차]
'''굵게''', ''기울임'', __밑줄__, ~~취소선~~, ^^위첨자^^, ,,아래첨자,,.
{{{+2 큰 글씨}}} {{{#red 빨간 글씨}}} [[외부|{{{#blue 표시}}}]]

== 목록 ==
 * 첫째 항목
  * 하위 항목 [[링크]]
 * 둘째 항목[* 첫 각주]
 1.#3 셋째부터
 1. 넷째

== 표 ==
||<tablealign=center><tablebordercolor=#ccc><-2> 머리 ||<|2> 세로 ||
|| 가 || 나 ||
||<bgcolor=#eee,#333> 다 || 라 || 마 ||

== 조건과 틀 ==
{{{#!if 1 + 1 == 2
조건이 참이면 '''보인다'''.
}}}
[include(틀:상자, 제목=벤치, 내용=틀 내용)]

== 코드 ==
{{{#!syntax rust
fn main() {
    println!("hello");
}
}}}
{{{#!folding 펼치기
> 인용문 안의 [[문서#부분|앵커 링크]]
}}}
----
[각주]
"#;

fn lookup() -> Arc<MemoryLookup> {
  let mut lookup = MemoryLookup::new();
  lookup
    .insert_document(
      DocumentRef::new("틀", "상자"),
      "{{{#!wiki style=\"border:1px solid #ccc\"\n'''@제목@'''\n@내용=빈 상자@[* 틀 각주]\n}}}",
    )
    .insert_document(DocumentRef::new("문서", "링크"), "있는 문서");
  Arc::new(lookup)
}

fn bench_render(c: &mut Criterion) {
  let mut group = c.benchmark_group("render");
  let processor = MarkupProcessor::new(MarkupOptions::default());
  let request = RenderRequest::new(DocumentRef::new("문서", "벤치"), lookup());

  for (name, text) in [("small", DOC_SMALL), ("large", DOC_LARGE)] {
    group.bench_with_input(BenchmarkId::new("process", name), &text, |b, text| {
      b.iter(|| processor.process(black_box(text), black_box(&request)));
    });

    let parsed = processor.parse(text, &request).unwrap();
    group.bench_with_input(BenchmarkId::new("cached", name), &parsed, |b, parsed| {
      b.iter(|| processor.render(black_box(parsed), black_box(&request)));
    });
  }

  group.finish();
}

fn bench_batch(c: &mut Criterion) {
  let mut group = c.benchmark_group("batch");
  let processor = MarkupProcessor::new(MarkupOptions::default());
  let lookup = lookup();
  let jobs: Vec<(String, RenderRequest)> = (0..64)
    .map(|i| {
      let request = RenderRequest::new(
        DocumentRef::new("문서", format!("문서 {i}")),
        Arc::clone(&lookup) as Arc<dyn namumark::DocumentLookup>,
      );
      (DOC_LARGE.to_string(), request)
    })
    .collect();

  group.bench_function("large_x64", |b| {
    b.iter(|| process_batch(black_box(&processor), black_box(&jobs)));
  });

  group.finish();
}

criterion_group!(benches, bench_render, bench_batch);
criterion_main!(benches);
