//! Tile Mosaic Pass
//!
//! Default [`ShadingPass`] for the wgpu backend: every pixel of the frame
//! target takes the reduced texel of the tile it lies in, producing a
//! `tile_size`-pixel mosaic of the source frame.

use super::fullscreen::{FullscreenPipelines, draw_fullscreen};
use super::{WgpuDevice, WgpuImage};
use crate::core::GpuImage;
use crate::core::image::ensure_usage;
use crate::errors::{Result, TilingError};
use crate::postprocess::{ShadingPass, TileParams};

const TILE_MOSAIC_WGSL: &str = r"
struct TileParams {
    tile_per_row_line : vec4<f32>,
};

@group(0) @binding(0) var t_reduced : texture_2d<f32>;
@group(0) @binding(1) var<uniform> params : TileParams;

@fragment
fn fs_main(in : VertexOutput) -> @location(0) vec4<f32> {
    let last = vec2<i32>(textureDimensions(t_reduced)) - vec2<i32>(1);
    let tile = vec2<i32>(floor(in.position.xy * params.tile_per_row_line.w));
    return textureLoad(t_reduced, clamp(tile, vec2<i32>(0), last), 0);
}
";

pub struct TileMosaicPass {
    layout: wgpu::BindGroupLayout,
    uniforms: wgpu::Buffer,
    pipelines: FullscreenPipelines,
}

impl TileMosaicPass {
    #[must_use]
    pub fn new(device: &WgpuDevice) -> Self {
        let raw = device.raw();

        let layout = raw.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Tile Mosaic Layout"),
            entries: &[
                // Binding 0: Reduced image
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Binding 1: TileParams
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let uniforms = raw.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Tile Mosaic Params"),
            size: std::mem::size_of::<TileParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let pipelines = FullscreenPipelines::new(raw, "Tile Mosaic", TILE_MOSAIC_WGSL, &layout);

        Self {
            layout,
            uniforms,
            pipelines,
        }
    }
}

impl ShadingPass<WgpuDevice> for TileMosaicPass {
    fn name(&self) -> &str {
        "Tile Mosaic"
    }

    fn apply(
        &mut self,
        device: &WgpuDevice,
        input: &WgpuImage,
        target: &WgpuImage,
        params: &TileParams,
    ) -> Result<()> {
        if input.id() == target.id() {
            return Err(TilingError::Configuration(format!(
                "{}: input and target are the same image #{}",
                self.name(),
                input.id()
            )));
        }
        ensure_usage(input, wgpu::TextureUsages::TEXTURE_BINDING, "mosaic source")?;
        ensure_usage(target, wgpu::TextureUsages::RENDER_ATTACHMENT, "mosaic target")?;
        super::ensure_float_sampled(input.format(), input.texture().sample_count())?;
        super::ensure_float_renderable(target.format(), device.features())?;
        super::ensure_single_sampled_target(target)?;

        let raw = device.raw();
        device
            .queue()
            .write_buffer(&self.uniforms, 0, bytemuck::bytes_of(params));

        let bind_group = raw.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Tile Mosaic BG"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(input.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.uniforms.as_entire_binding(),
                },
            ],
        });

        let mut encoder = raw.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Tile Mosaic Encoder"),
        });
        let pipeline = self.pipelines.get_or_create(raw, target.format());
        draw_fullscreen(
            &mut encoder,
            "Tile Mosaic Pass",
            pipeline,
            &bind_group,
            target.view(),
        );
        device.queue().submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}
