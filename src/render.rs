//! Draw-pass entry points. Renderers walk drawdata and emit commands
//! through a [`DrawEncoder`]; the wgpu encoder records into a render pass.

use std::sync::Arc;

use glam::Mat4;

use crate::drawdata::{DrawGroups, MainViewDrawdata, ShadowDrawdata};
use crate::error::{Result, ResultExt};
use crate::gpu::wgpu_device::WgpuDevice;
use crate::gpu::RenderDevice;
use crate::material::{MaterialBinding, MaterialCache};
use crate::model::GeometryRef;
use crate::pipeline::PipelineTable;

pub trait DrawEncoder<D: RenderDevice> {
    type Pipeline;

    fn bind_pipeline(&mut self, pipeline: &Self::Pipeline, view_projection: Mat4);

    fn bind_material(&mut self, material: &MaterialBinding<D>);

    fn draw(&mut self, geometry: GeometryRef<'_, D::Buffer>, transform: Mat4);
}

#[derive(Clone, Copy)]
enum Variant {
    Main,
    Shadow,
}

fn encode_groups<D, E>(
    encoder: &mut E,
    pipelines: &PipelineTable<E::Pipeline>,
    view_projection: Mat4,
    groups: &DrawGroups<'_, D>,
    material_sets: &[Arc<MaterialCache<D>>],
    variant: Variant,
) where
    D: RenderDevice,
    E: DrawEncoder<D>,
{
    for (key, drawcalls) in groups.iter() {
        encoder.bind_pipeline(pipelines.get(key), view_projection);

        let mut bound: Option<&MaterialBinding<D>> = None;
        for grouped in drawcalls {
            let binding = material_sets[grouped.material_set].resolve(grouped.drawcall.material_index);
            if !bound.is_some_and(|b| std::ptr::eq(b, binding)) {
                encoder.bind_material(binding);
                bound = Some(binding);
            }

            let primitive = grouped.drawcall.primitive;
            let geometry = match variant {
                Variant::Main => primitive.main_geometry(),
                Variant::Shadow => primitive.shadow_geometry(),
            };
            encoder.draw(geometry, grouped.drawcall.transform);
        }
    }
}

pub struct GbufferRenderer<P> {
    pipelines: PipelineTable<P>,
}

impl<P> GbufferRenderer<P> {
    pub fn new(pipelines: PipelineTable<P>) -> Self {
        Self { pipelines }
    }

    pub fn render<D, E>(&self, encoder: &mut E, drawdata: &MainViewDrawdata<'_, D>)
    where
        D: RenderDevice,
        E: DrawEncoder<D, Pipeline = P>,
    {
        encode_groups(
            encoder,
            &self.pipelines,
            drawdata.view_projection(),
            drawdata.groups(),
            drawdata.material_sets(),
            Variant::Main,
        );
    }
}

pub struct ShadowRenderer<P> {
    pipelines: PipelineTable<P>,
}

impl<P> ShadowRenderer<P> {
    pub fn new(pipelines: PipelineTable<P>) -> Self {
        Self { pipelines }
    }

    /// Renders every cascade into the pass `begin_pass(level)` returns.
    pub fn render<D, E>(
        &self,
        drawdata: &ShadowDrawdata<'_, D>,
        mut begin_pass: impl FnMut(usize) -> Result<E>,
    ) -> Result<()>
    where
        D: RenderDevice,
        E: DrawEncoder<D, Pipeline = P>,
    {
        for (index, level) in drawdata.levels().iter().enumerate() {
            let mut encoder = begin_pass(index).context("Acquire shadow render pass failed")?;
            encode_groups(
                &mut encoder,
                &self.pipelines,
                level.vp_matrix(),
                level.groups(),
                drawdata.material_sets(),
                Variant::Shadow,
            );
        }
        Ok(())
    }
}

/// Records into a wgpu render pass. The view-projection matrix goes to
/// vertex push constants at offset 0 and the model transform at offset 64;
/// material groups bind at `material_group`.
pub struct WgpuDrawEncoder<'p, 'e> {
    pass: &'p mut wgpu::RenderPass<'e>,
    material_group: u32,
}

impl<'p, 'e> WgpuDrawEncoder<'p, 'e> {
    pub fn new(pass: &'p mut wgpu::RenderPass<'e>, material_group: u32) -> Self {
        Self { pass, material_group }
    }
}

impl DrawEncoder<WgpuDevice> for WgpuDrawEncoder<'_, '_> {
    type Pipeline = wgpu::RenderPipeline;

    fn bind_pipeline(&mut self, pipeline: &wgpu::RenderPipeline, view_projection: Mat4) {
        self.pass.set_pipeline(pipeline);
        self.pass
            .set_push_constants(wgpu::ShaderStages::VERTEX, 0, bytemuck::bytes_of(&view_projection));
    }

    fn bind_material(&mut self, material: &MaterialBinding<WgpuDevice>) {
        self.pass
            .set_bind_group(self.material_group, &material.group.bind_group, &[]);
    }

    fn draw(&mut self, geometry: GeometryRef<'_, wgpu::Buffer>, transform: Mat4) {
        self.pass.set_vertex_buffer(0, geometry.vertex.slice(..));
        self.pass
            .set_index_buffer(geometry.index.slice(..), wgpu::IndexFormat::Uint32);
        self.pass
            .set_push_constants(wgpu::ShaderStages::VERTEX, 64, bytemuck::bytes_of(&transform));
        self.pass.draw_indexed(0..geometry.index_count, 0, 0..1);
    }
}
