use super::fullscreen::{FullscreenPipelines, draw_fullscreen};

/// Exact 2x2 box filter. `textureLoad` keeps the result independent of
/// sampler state and works for unfilterable float formats.
const BOX_DOWNSAMPLE_WGSL: &str = r"
@group(0) @binding(0) var t_src : texture_2d<f32>;

@fragment
fn fs_main(in : VertexOutput) -> @location(0) vec4<f32> {
    let last = vec2<i32>(textureDimensions(t_src)) - vec2<i32>(1);
    let base = vec2<i32>(in.position.xy) * 2;

    let a = textureLoad(t_src, min(base, last), 0);
    let b = textureLoad(t_src, min(base + vec2<i32>(1, 0), last), 0);
    let c = textureLoad(t_src, min(base + vec2<i32>(0, 1), last), 0);
    let d = textureLoad(t_src, min(base + vec2<i32>(1, 1), last), 0);
    return (a + b + c + d) * 0.25;
}
";

/// Records 2x2 box reductions into a command encoder.
pub(crate) struct BoxDownsampler {
    layout: wgpu::BindGroupLayout,
    pipelines: FullscreenPipelines,
}

impl BoxDownsampler {
    pub fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Box Downsample Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let pipelines =
            FullscreenPipelines::new(device, "Box Downsample", BOX_DOWNSAMPLE_WGSL, &layout);

        Self { layout, pipelines }
    }

    pub fn encode(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        src: &wgpu::TextureView,
        dst: &wgpu::TextureView,
        dst_format: wgpu::TextureFormat,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Box Downsample BG"),
            layout: &self.layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(src),
            }],
        });

        let pipeline = self.pipelines.get_or_create(device, dst_format);
        draw_fullscreen(encoder, "Box Downsample Pass", pipeline, &bind_group, dst);
    }
}
