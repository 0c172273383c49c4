use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ragdesk::domains::preferences::ColorPalette;
use ragdesk::domains::presentation::{GeneratedSection, PresentationBrief, PresentationData};
use ragdesk::presentation::generator::{bullets_from, derive_slides};
use ragdesk::presentation::{default_templates, render_html, write_pptx};

const SECTION_TEXT: &str = "Acme ships 40k parcels a week across three regions.\n\n\
- **Late deliveries** cost 4% of revenue\n\
- Manual route planning takes two days per week\n\
- Drivers lack live traffic data\n\
1. Pilot in the northern region\n\
2) Roll out nationally within a quarter";

fn sample() -> PresentationData {
    let brief = PresentationBrief {
        client_name: "Acme Freight".to_string(),
        industry: "Logistics".to_string(),
        pain_points: "late deliveries, manual planning".to_string(),
        interests: "route optimisation".to_string(),
    };
    let sections: Vec<GeneratedSection> = default_templates()
        .into_iter()
        .map(|t| GeneratedSection {
            key: t.key,
            title: t.title,
            content: SECTION_TEXT.to_string(),
            fallback: false,
        })
        .collect();
    let slides = derive_slides(&brief, &sections);
    PresentationData {
        brief,
        sections,
        slides,
    }
}

fn bench_slides(c: &mut Criterion) {
    let data = sample();
    let palette = ColorPalette::default();

    let mut group = c.benchmark_group("slides");
    group.bench_function("bullets_from", |b| {
        b.iter(|| bullets_from(black_box(SECTION_TEXT)))
    });
    group.bench_function("derive_slides", |b| {
        b.iter(|| derive_slides(black_box(&data.brief), black_box(&data.sections)))
    });
    group.bench_function("render_html", |b| {
        b.iter(|| render_html(black_box(&data), &palette).unwrap())
    });
    group.bench_function("write_pptx", |b| {
        b.iter(|| write_pptx(black_box(&data), &palette, Cursor::new(Vec::new())).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_slides);
criterion_main!(benches);
