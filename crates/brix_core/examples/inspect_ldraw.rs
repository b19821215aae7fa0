//! Example: Load and inspect an LDraw model.
//!
//! Run with: cargo run --example inspect_ldraw -- <model> <library-dir>...

use std::env;

use anyhow::Context;
use brix_core::ldraw::SearchPaths;
use brix_core::{Session, SessionConfig};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: inspect_ldraw <model> [library-dir...]");
        println!("\nExamples:");
        println!("  cargo run --example inspect_ldraw -- car.mpd ~/ldraw");
        println!("  cargo run --example inspect_ldraw -- 3001.dat ~/ldraw ~/ldraw/unofficial");
        return Ok(());
    }

    let model = std::path::Path::new(&args[1]);
    // The model's own directory comes first
    let mut resolver = SearchPaths::new(model.parent());
    for dir in &args[2..] {
        resolver.push_root(dir);
    }

    let config = match env::var("BRIX_CONFIG") {
        Ok(path) => SessionConfig::load(&path).with_context(|| format!("reading {}", path))?,
        Err(_) => SessionConfig::default(),
    };

    let name = model
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("model.ldr");
    println!("Loading LDraw model: {}", name);

    let mut session = Session::new(resolver, config);
    let scene = session
        .import(name)
        .with_context(|| format!("importing {}", name))?;

    println!("\n=== Scene: {} ===", scene.name);
    println!("Prototypes: {}", scene.prototype_count());
    println!("Instances: {}", scene.instance_count());
    println!("Groups: {}", scene.groups.len());
    println!("Total faces: {}", scene.total_face_count());
    println!("Total triangles: {}", scene.total_triangle_count());

    println!("\n--- Prototypes ---");
    for proto in &scene.prototypes {
        println!(
            "  [{}] {} ({}) - {} faces, {} edges{}",
            proto.id,
            proto.name,
            proto.key,
            proto.geometry.face_count(),
            proto.geometry.edge_count(),
            if proto.geometry.has_uvs() { ", textured" } else { "" }
        );
    }

    println!("\n--- Groups ---");
    for group in &scene.groups {
        let parent = group
            .parent
            .map(|p| scene.groups[p].name.as_str())
            .unwrap_or("<root>");
        println!("  [{}] {} in {}", group.id, group.name, parent);
    }

    println!("\n--- Instances ---");
    for (i, instance) in scene.instances.iter().enumerate() {
        let pos = instance
            .world_transform
            .transform_point3(brix_math::Vec3::ZERO);
        println!(
            "  [{}] Proto {} colour {} at ({:.2}, {:.2}, {:.2})",
            i, instance.prototype_id, instance.color, pos.x, pos.y, pos.z
        );
    }

    let texmaps = session.texmaps();
    if !texmaps.is_empty() {
        println!("\n--- Texture Mappings ---");
        for mapping in texmaps.iter() {
            println!(
                "  [{}] {} {}",
                mapping.id,
                mapping.projection.method_name(),
                mapping.texture
            );
        }
    }

    if !scene.directives.is_empty() {
        println!("\n--- Directives ---");
        for directive in &scene.directives {
            println!(
                "  {:?} {} (after instance {})",
                directive.directive.kind,
                directive.directive.args.join(" "),
                directive.instance_index
            );
        }
    }

    if !scene.warnings.is_empty() {
        println!("\n--- Warnings ---");
        for warning in &scene.warnings {
            println!("  {}", warning);
        }
    }

    let world_bounds = scene.world_bounds();
    if !world_bounds.is_empty() {
        println!("\n--- World Bounds ---");
        println!(
            "  Min: ({:.2}, {:.2}, {:.2})",
            world_bounds.x.min, world_bounds.y.min, world_bounds.z.min
        );
        println!(
            "  Max: ({:.2}, {:.2}, {:.2})",
            world_bounds.x.max, world_bounds.y.max, world_bounds.z.max
        );
    }

    Ok(())
}
