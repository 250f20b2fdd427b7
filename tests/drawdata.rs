mod common;

use common::{camera, triangle_scene, MockDevice};
use glam::{Mat4, Vec3, Vec4};
use gltf_scene::config::LoadConfig;
use gltf_scene::document::Material;
use gltf_scene::material::AlphaMode;
use gltf_scene::pipeline::PipelineKey;
use gltf_scene::{Frustum, MainViewDrawdata, Model, ShadowDrawdata, CASCADE_COUNT};

const EYE: Vec3 = Vec3::new(0.0, 0.0, 5.0);

fn triangle_model(children: usize) -> Model<MockDevice> {
    Model::load(&MockDevice::new(), &triangle_scene(children), &LoadConfig::default(), None).unwrap()
}

#[test]
fn visible_triangle_is_grouped_and_tracks_depth() {
    let model = triangle_model(1);
    let drawdata = model.generate_drawdata(Mat4::IDENTITY);

    let mut main = MainViewDrawdata::new(camera(EYE), EYE);
    main.append(&drawdata);

    let groups: Vec<_> = main.groups().iter().collect();
    assert_eq!(groups.len(), 1);
    let (key, drawcalls) = groups[0];
    assert_eq!(
        key,
        PipelineKey {
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
            rigged: false,
        }
    );
    assert_eq!(drawcalls.len(), 1);

    // Reverse-Z: farther geometry has smaller depth.
    assert!(main.min_z() > 0.0 && main.min_z() < 1.0);
}

#[test]
fn geometry_behind_the_camera_is_culled() {
    let model = triangle_model(1);
    let drawdata = model.generate_drawdata(Mat4::from_translation(Vec3::new(0.0, 0.0, 20.0)));

    let mut main = MainViewDrawdata::new(camera(EYE), EYE);
    main.append(&drawdata);
    assert!(main.groups().is_empty());
    assert_eq!(main.min_z(), 1.0);

    let mut unculled =
        MainViewDrawdata::new(camera(EYE), EYE).with_frustum(Frustum::from_planes([Vec4::ZERO; 6]));
    unculled.append(&drawdata);
    assert_eq!(unculled.groups().len(), 1);
}

#[test]
fn groups_follow_material_flags() {
    let mut doc = triangle_scene(2);
    doc.materials.push(Material {
        alpha_mode: AlphaMode::Blend,
        ..Default::default()
    });
    doc.meshes.push(doc.meshes[0].clone());
    doc.meshes[1].primitives[0].material = Some(0);
    doc.nodes[2].mesh = Some(1);

    let model = Model::load(&MockDevice::new(), &doc, &LoadConfig::default(), None).unwrap();
    let drawdata = model.generate_drawdata(Mat4::IDENTITY);

    let mut main = MainViewDrawdata::new(camera(EYE), EYE);
    main.append(&drawdata);

    let keys: Vec<_> = main.groups().iter().map(|(key, _)| key.alpha_mode).collect();
    assert_eq!(keys, vec![AlphaMode::Opaque, AlphaMode::Blend]);
}

#[test]
fn several_models_share_one_frame() {
    let first = triangle_model(1);
    let second = triangle_model(2);

    let mut main = MainViewDrawdata::new(camera(EYE), EYE);
    main.append(&first.generate_drawdata(Mat4::IDENTITY));
    main.append(&second.generate_drawdata(Mat4::IDENTITY));

    assert_eq!(main.groups().len(), 3);
    assert_eq!(main.material_sets().len(), 2);
    for (_, drawcalls) in main.groups().iter() {
        for grouped in drawcalls {
            let binding = main.material(grouped);
            let expected = main.material_sets()[grouped.material_set].default_binding();
            assert!(std::ptr::eq(binding, expected));
        }
    }
}

#[test]
fn cascades_split_the_visible_depth_range() {
    let model = triangle_model(1);
    let drawdata = model.generate_drawdata(Mat4::IDENTITY);
    let view_projection = camera(EYE);

    let mut main = MainViewDrawdata::new(view_projection, EYE);
    main.append(&drawdata);

    let light = Vec3::new(-0.3, -1.0, -0.2);
    let mut shadow = ShadowDrawdata::new(view_projection, light, main.min_z(), 0.5);
    shadow.append(&drawdata);

    let splits = shadow.split_depths();
    assert_eq!(splits[0], 1.0);
    assert_eq!(splits[CASCADE_COUNT], main.min_z());
    assert!(splits.windows(2).all(|pair| pair[0] > pair[1]));

    assert_eq!(shadow.levels().len(), CASCADE_COUNT);
    assert!(shadow.levels().iter().any(|level| !level.groups().is_empty()));

    for level in 0..CASCADE_COUNT {
        let matrix = shadow.vp_matrix(level);
        assert!(matrix.is_finite());
    }
}

#[test]
fn caster_lands_inside_its_cascade_volume() {
    let model = triangle_model(1);
    let drawdata = model.generate_drawdata(Mat4::IDENTITY);
    let view_projection = camera(EYE);

    let mut main = MainViewDrawdata::new(view_projection, EYE);
    main.append(&drawdata);

    let mut shadow = ShadowDrawdata::new(view_projection, Vec3::NEG_Y, main.min_z(), 1.0);
    shadow.append(&drawdata);

    let level = shadow
        .levels()
        .iter()
        .find(|level| !level.groups().is_empty())
        .unwrap();

    let bounds = drawdata.drawcalls[0].world_bounds;
    let center = level.vp_matrix().project_point3((bounds.min + bounds.max) * 0.5);
    assert!(center.z >= -1e-4 && center.z <= 1.0 + 1e-4, "depth {}", center.z);
}

#[test]
fn empty_cascades_still_have_usable_matrices() {
    let shadow: ShadowDrawdata<'_, MockDevice> =
        ShadowDrawdata::new(camera(EYE), Vec3::new(0.2, -1.0, 0.1), 0.0, 0.5);

    for level in shadow.levels() {
        assert!(level.groups().is_empty());
        assert!(level.vp_matrix().is_finite());
        assert!(level.bound().area() >= 0.0);
    }
}
