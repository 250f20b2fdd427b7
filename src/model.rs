//! A loaded, ready-to-draw scene: GPU primitives, the node hierarchy and
//! the shared material cache.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use glam::Mat4;

use crate::config::LoadConfig;
use crate::culling;
use crate::document::Document;
use crate::error::{Error, ErrorKind, Result, ResultExt};
use crate::geometry::{self, Aabb, PrimitiveData};
use crate::gpu::{BufferUsage, RenderDevice};
use crate::material::{MaterialCache, MaterialList};
use crate::progress::{self, LoadStage, ProgressCell};
use crate::scene_graph::SceneGraph;

/// One index buffer range over one vertex buffer.
pub struct GeometryRef<'a, B> {
    pub vertex: &'a B,
    pub index: &'a B,
    pub index_count: u32,
}

pub struct PrimitiveGpu<D: RenderDevice> {
    vertex_buffer: D::Buffer,
    index_buffer: D::Buffer,
    shadow_vertex_buffer: D::Buffer,
    shadow_index_buffer: D::Buffer,
    index_count: u32,
    shadow_index_count: u32,
    pub material: Option<usize>,
    pub bounds: Aabb,
    pub rigged: bool,
}

impl<D: RenderDevice> PrimitiveGpu<D> {
    pub fn upload(device: &D, data: &PrimitiveData) -> Result<Self> {
        let vertex_buffer = device
            .create_buffer_init(BufferUsage::VERTEX, bytemuck::cast_slice(&data.vertices))
            .context("upload vertex buffer")?;
        let index_buffer = device
            .create_buffer_init(BufferUsage::INDEX, bytemuck::cast_slice(&data.indices))
            .context("upload index buffer")?;
        let shadow_vertex_buffer = device
            .create_buffer_init(BufferUsage::VERTEX, bytemuck::cast_slice(&data.shadow_vertices))
            .context("upload shadow vertex buffer")?;
        let shadow_index_buffer = device
            .create_buffer_init(BufferUsage::INDEX, bytemuck::cast_slice(&data.shadow_indices))
            .context("upload shadow index buffer")?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            shadow_vertex_buffer,
            shadow_index_buffer,
            index_count: data.indices.len() as u32,
            shadow_index_count: data.shadow_indices.len() as u32,
            material: data.material,
            bounds: data.bounds,
            rigged: data.rigged,
        })
    }

    pub fn main_geometry(&self) -> GeometryRef<'_, D::Buffer> {
        GeometryRef {
            vertex: &self.vertex_buffer,
            index: &self.index_buffer,
            index_count: self.index_count,
        }
    }

    pub fn shadow_geometry(&self) -> GeometryRef<'_, D::Buffer> {
        GeometryRef {
            vertex: &self.shadow_vertex_buffer,
            index: &self.shadow_index_buffer,
            index_count: self.shadow_index_count,
        }
    }
}

struct ModelNode {
    name: Option<String>,
    transform: Mat4,
    mesh: Option<usize>,
}

/// One primitive to draw this frame.
pub struct Drawcall<'m, D: RenderDevice> {
    pub transform: Mat4,
    pub primitive: &'m PrimitiveGpu<D>,
    pub material_index: Option<usize>,
    pub world_bounds: Aabb,
}

impl<D: RenderDevice> Clone for Drawcall<'_, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D: RenderDevice> Copy for Drawcall<'_, D> {}

/// Every drawcall of one model for one frame, plus the cache their
/// material indices resolve against.
pub struct Drawdata<'m, D: RenderDevice> {
    pub drawcalls: Vec<Drawcall<'m, D>>,
    pub material_cache: Arc<MaterialCache<D>>,
}

/// Per-frame adjustments to the model's node hierarchy.
#[derive(Debug, Clone, Default)]
pub struct DrawOptions {
    /// Replaces the local transform of a node.
    pub overrides: HashMap<usize, Mat4>,
    /// Nodes skipped together with their subtrees.
    pub hidden: HashSet<usize>,
}

pub struct Model<D: RenderDevice> {
    nodes: Vec<ModelNode>,
    meshes: Vec<Vec<PrimitiveGpu<D>>>,
    graph: SceneGraph,
    material_cache: Arc<MaterialCache<D>>,
}

impl<D: RenderDevice> Model<D> {
    /// Converts and uploads everything in `doc`. Either the whole model
    /// loads or the first error is returned.
    pub fn load(
        device: &D,
        doc: &Document,
        config: &LoadConfig,
        progress: Option<&ProgressCell>,
    ) -> Result<Self> {
        progress::report(progress, LoadStage::Node, None);
        doc.validate().context("validate document")?;
        let graph = SceneGraph::solve(doc).context("solve scene graph")?;

        progress::report(progress, LoadStage::Mesh, Some(0.0));
        let meshes = doc
            .meshes
            .iter()
            .enumerate()
            .map(|(mesh_index, mesh)| {
                let primitives = mesh
                    .primitives
                    .iter()
                    .enumerate()
                    .map(|(i, primitive)| {
                        match primitive.material {
                            Some(material) if material >= doc.materials.len() => {
                                return Err(Error::new(ErrorKind::InvalidMaterialIndex(format!(
                                    "material {material}, only {} exist",
                                    doc.materials.len()
                                )))
                                .propagate(format!("primitive {i}")));
                            }
                            _ => {}
                        }

                        let data = geometry::convert_primitive(primitive, &config.geometry)
                            .with_context(|| format!("convert primitive {i}"))?;
                        PrimitiveGpu::upload(device, &data).with_context(|| format!("upload primitive {i}"))
                    })
                    .collect::<Result<Vec<_>>>()
                    .with_context(|| format!("load mesh {mesh_index}"))?;

                progress::report(
                    progress,
                    LoadStage::Mesh,
                    Some((mesh_index + 1) as f32 / doc.meshes.len() as f32),
                );
                Ok(primitives)
            })
            .collect::<Result<Vec<_>>>()?;

        let materials = MaterialList::load(device, doc, config, progress).context("load material list")?;
        let material_cache = Arc::new(materials.build_cache(device).context("build material cache")?);

        progress::report(progress, LoadStage::Postprocess, None);

        let nodes = doc
            .nodes
            .iter()
            .map(|node| ModelNode {
                name: node.name.clone(),
                transform: node.transform,
                mesh: node.mesh,
            })
            .collect();

        let model = Self {
            nodes,
            meshes,
            graph,
            material_cache,
        };

        log::info!(
            "model loaded: {} nodes, {} meshes, {} primitives, {} materials",
            model.nodes.len(),
            model.meshes.len(),
            model.primitive_count(),
            model.material_cache.len()
        );

        Ok(model)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_name(&self, node: usize) -> Option<&str> {
        self.nodes.get(node).and_then(|n| n.name.as_deref())
    }

    pub fn primitive_count(&self) -> usize {
        self.meshes.iter().map(Vec::len).sum()
    }

    pub fn scene_graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn material_cache(&self) -> &Arc<MaterialCache<D>> {
        &self.material_cache
    }

    pub fn generate_drawdata(&self, transform: Mat4) -> Drawdata<'_, D> {
        self.generate_drawdata_with(transform, &DrawOptions::default())
    }

    /// Walks renderable nodes parent-first, composing world transforms.
    pub fn generate_drawdata_with(&self, transform: Mat4, options: &DrawOptions) -> Drawdata<'_, D> {
        let mut world: Vec<Option<Mat4>> = vec![None; self.nodes.len()];
        let mut drawcalls = Vec::new();

        for &index in &self.graph.topo_order {
            if !self.graph.is_renderable(index) || options.hidden.contains(&index) {
                continue;
            }

            let parent_world = match self.graph.parent(index) {
                Some(parent) => match world[parent] {
                    Some(m) => m,
                    // hidden ancestor
                    None => continue,
                },
                None => transform,
            };

            let node = &self.nodes[index];
            let local = options.overrides.get(&index).copied().unwrap_or(node.transform);
            let node_world = parent_world * local;
            world[index] = Some(node_world);

            let Some(primitives) = node.mesh.and_then(|m| self.meshes.get(m)) else {
                continue;
            };

            drawcalls.extend(primitives.iter().map(|primitive| Drawcall {
                transform: node_world,
                primitive,
                material_index: primitive.material,
                world_bounds: culling::local_bound_to_world(&primitive.bounds, &node_world),
            }));
        }

        Drawdata {
            drawcalls,
            material_cache: self.material_cache.clone(),
        }
    }
}
