use std::path::Path;

use console::Style;
use reflex_core::pipeline::config::ReductionConfig;
use reflex_core::pipeline::ReductionOutput;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_reduction_summary(config: &ReductionConfig, output: &Path) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Reflex Reduction"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(16)));
    println!();

    println!("  {}", s.header.apply_to("Scans"));
    for scan in &config.scans {
        println!("    {}", s.path.apply_to(scan.display()));
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(output.display())
    );
    println!();

    println!("  {}", s.header.apply_to("Corrections"));
    let crop = match (&config.crop.region, &config.crop.around_peak) {
        (Some(region), _) => region.to_string(),
        (None, Some(window)) => format!("{}x{} around peak", window.x_size, window.y_size),
        (None, None) => "first signal region".to_string(),
    };
    println!("    {:<12}{}", s.label.apply_to("Crop"), s.value.apply_to(crop));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Background"),
        s.method.apply_to(config.background.method)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Footprint"),
        s.value.apply_to(format!(
            "beam {} m, sample {} m",
            config.setup.beam_width, config.setup.sample_size
        ))
    );
    match &config.setup.normalisation {
        Some(norm) => println!(
            "    {:<12}{}",
            s.label.apply_to("DCD"),
            s.path.apply_to(norm.file.display())
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("DCD"),
            s.disabled.apply_to("disabled")
        ),
    }
    match &config.rebin {
        Some(rebin) if rebin.new_q.is_some() => println!(
            "    {:<12}{}",
            s.label.apply_to("Rebin"),
            s.method.apply_to("explicit grid")
        ),
        Some(rebin) => println!(
            "    {:<12}{}",
            s.label.apply_to("Rebin"),
            s.method.apply_to(format!("{} x {}", rebin.shape, rebin.n_q_vectors))
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Rebin"),
            s.disabled.apply_to("disabled")
        ),
    }
    println!();
}

pub fn print_reduction_result(output: &ReductionOutput, path: &Path) {
    let s = Styles::new();
    let curve = &output.curve;

    println!();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Points"),
        s.value.apply_to(curve.len())
    );
    if let (Some(first), Some(last)) = (curve.q.first(), curve.q.last()) {
        println!(
            "  {:<14}{}",
            s.label.apply_to("q range"),
            s.value.apply_to(format!("{first:.5} .. {last:.5} 1/Å"))
        );
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Saved to"),
        s.path.apply_to(path.display())
    );
}
