use std::path::Path;

use console::Style;
use tessera_core::render::DrawStats;
use tessera_core::scheduler::BatchSummary;
use tessera_core::SubsamplingImage;

struct Styles {
    title: Style,
    label: Style,
    value: Style,
    warn: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            warn: Style::new().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_render_summary(
    image: &SubsamplingImage,
    stats: &DrawStats,
    decodes: &BatchSummary,
    output: &Path,
) {
    let s = Styles::new();
    let viewport = image.viewport();
    let source = viewport.source_size();
    let available = viewport.available_size();

    println!();
    println!("  {}", s.title.apply_to("Tessera Render"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(14)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Source"),
        s.value.apply_to(format!("{}x{}", source.width, source.height))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Viewport"),
        s.value.apply_to(format!("{}x{}", available.width, available.height))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Scale"),
        s.value.apply_to(format!(
            "{:.4} (fit {:.4}, max {:.2})",
            viewport.scale(),
            viewport.min_scale(),
            viewport.max_scale()
        ))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Threads"),
        s.value.apply_to(image.worker_threads())
    );

    if let Some(map) = image.tile_map() {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Pyramid"),
            s.value.apply_to(format!(
                "{} levels, {} tiles, base {}",
                map.level_count(),
                map.tile_count(),
                map.base_level()
            ))
        );
    }

    println!(
        "  {:<14}{}",
        s.label.apply_to("Working"),
        s.value.apply_to(stats.working_sample_size)
    );
    if let Some(fallback) = stats.fallback_sample_size {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Fallback"),
            s.warn.apply_to(fallback)
        );
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Decoded"),
        s.value.apply_to(format!(
            "{} loaded, {} failed, {} skipped",
            decodes.loaded, decodes.failed, decodes.cancelled
        ))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Drawn"),
        s.value.apply_to(stats.drawn)
    );
    if stats.missing > 0 || stats.errored > 0 {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Incomplete"),
            s.warn.apply_to(format!(
                "{} missing, {} errored",
                stats.missing, stats.errored
            ))
        );
    }

    println!();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(output.display())
    );
    println!();
}
