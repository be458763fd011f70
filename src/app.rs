use anyhow::{Context, Result};

use crate::config::ProjectorConfig;
use crate::render::{DrawList, HeadlessGpu};
use crate::scene::{SceneSummary, SlideProjectorScene};

/// Builds the scene against the headless backend, records one frame and prints it.
pub fn run_headless(config: &ProjectorConfig) -> Result<()> {
    let mut gpu = HeadlessGpu::new();
    let mut scene =
        SlideProjectorScene::new(config, &mut gpu).context("failed to build the scene")?;

    let mut draws = DrawList::new();
    scene.record_frame(&mut draws);
    gpu.submit(&draws);
    print_scene_summary(&scene.summary(), &draws);

    scene.release(&mut gpu);
    Ok(())
}

pub fn print_scene_summary(summary: &SceneSummary, draws: &DrawList) {
    for line in describe_scene(summary, draws) {
        println!("{line}");
    }
}

/// Human readable lines describing the loaded slide, the lights and one recorded frame.
pub fn describe_scene(summary: &SceneSummary, draws: &DrawList) -> Vec<String> {
    let mut lines = Vec::with_capacity(draws.len() + 4);
    match summary.slide_extent {
        Some(extent) => lines.push(format!(
            "Loaded {} slide {}x{} from {}",
            summary.mode,
            extent.width,
            extent.height,
            summary.slide_path.display()
        )),
        None => lines.push(format!(
            "No {} slide loaded from {}",
            summary.mode,
            summary.slide_path.display()
        )),
    }
    lines.push(format!(
        "Projector screen: {:.2} x {:.2} units",
        summary.screen_size.x, summary.screen_size.y
    ));
    lines.push(format!(
        "Lights: {} (switch {})",
        summary.light_count,
        if summary.light_on { "on" } else { "off" }
    ));
    lines.push(format!("Recorded {} draw calls:", draws.len()));
    for call in draws {
        lines.push(format!(
            " - {} ({} vertices, {})",
            call.label,
            call.vertex_count,
            call.primitive.name()
        ));
    }
    lines
}
