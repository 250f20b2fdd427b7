use std::env;
use std::process::ExitCode;

use glam::Mat4;
use gltf_scene::texture::{ColorCompression, NormalCompression};
use gltf_scene::{Document, LoadConfig, Model, ProgressCell, WgpuDevice};
use pollster::FutureExt as _;

fn usage() -> ExitCode {
    eprintln!("usage: inspect_scene <scene.gltf|scene.glb> [config.json]");
    ExitCode::FAILURE
}

fn request_device(config: &mut LoadConfig) -> Result<WgpuDevice, String> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .block_on()
        .map_err(|e| format!("no adapter: {e}"))?;

    let info = adapter.get_info();
    log::info!("adapter: {} ({:?})", info.name, info.backend);

    let wanted = wgpu::Features::TEXTURE_COMPRESSION_BC | wgpu::Features::TEXTURE_FORMAT_16BIT_NORM;
    let features = adapter.features() & wanted;

    if !features.contains(wgpu::Features::TEXTURE_COMPRESSION_BC) {
        log::warn!("adapter lacks BC compression, uploading raw textures");
        config.image.color_mode = ColorCompression::Rgba8Raw;
        config.image.normal_mode = NormalCompression::RgRaw;
    }
    if !features.contains(wgpu::Features::TEXTURE_FORMAT_16BIT_NORM) {
        log::warn!("adapter lacks 16-bit normalized formats, narrowing 16-bit normal maps");
        config.image.supports_rg16 = false;
    }

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("inspect_scene"),
            required_features: features,
            ..Default::default()
        })
        .block_on()
        .map_err(|e| format!("request device: {e}"))?;

    Ok(WgpuDevice::new(device, queue))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let Some(scene_path) = args.get(1) else {
        return usage();
    };

    let mut config = match args.get(2) {
        Some(path) => match LoadConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => LoadConfig::default(),
    };

    let device = match request_device(&mut config) {
        Ok(device) => device,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let progress = ProgressCell::new();
    let model = Document::import(scene_path)
        .and_then(|doc| Model::load(&device, &doc, &config, Some(&progress)));

    let model = match model {
        Ok(model) => model,
        Err(e) => {
            log::error!("loading {scene_path} failed at {:?}: {e}", progress.load().stage);
            return ExitCode::FAILURE;
        }
    };

    let drawdata = model.generate_drawdata(Mat4::IDENTITY);
    let renderable = (0..model.node_count())
        .filter(|&n| model.scene_graph().is_renderable(n))
        .count();

    println!("nodes:      {} ({renderable} renderable)", model.node_count());
    println!("primitives: {}", model.primitive_count());
    println!("materials:  {}", model.material_cache().len());
    println!("drawcalls:  {}", drawdata.drawcalls.len());

    if let Some(bounds) = drawdata
        .drawcalls
        .iter()
        .map(|d| d.world_bounds)
        .reduce(|a, b| gltf_scene::geometry::Aabb {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        })
    {
        println!("bounds:     {:?} .. {:?}", bounds.min, bounds.max);
    }

    ExitCode::SUCCESS
}
