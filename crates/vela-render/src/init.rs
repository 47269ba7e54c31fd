use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vela_atlas::AtlasGeometry;
use vela_core::{Config, FontBook, RenderError, Size};

use crate::fence::FrameFences;
use crate::painter::FrameResources;
use crate::shaders::{flat_shader, image_shader, sdf_shader, TONEMAP_SHADER, TRANSFER_PASSTHROUGH};
use crate::stream::{QuadIndexBuffer, StreamBuffer};
use crate::textures::{
    AtlasTexture, RenderTargets, DEPTH_FORMAT, GLYPH_ATLAS_FORMAT, HDR_FORMAT, IMAGE_ATLAS_FORMAT,
};
use crate::vertex::{FlatVertex, FrameConstants, ImageVertex, SdfVertex};
use crate::WgpuRenderer;

impl WgpuRenderer {
    /// Build every GPU resource for a configured surface. Shader or pipeline
    /// validation errors come back as `ShaderCompileFailure`.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        surface: wgpu::Surface<'static>,
        surface_config: wgpu::SurfaceConfiguration,
        config: &Config,
        fonts: FontBook,
    ) -> Result<Self, RenderError> {
        // --- Device health ---
        let device_lost = Arc::new(AtomicBool::new(false));
        device.on_uncaptured_error(Box::new(|e| log::error!("wgpu: {}", e)));
        {
            let lost = device_lost.clone();
            device.set_device_lost_callback(move |reason, message| {
                log::error!("device lost ({:?}): {}", reason, message);
                lost.store(true, Ordering::Release);
            });
        }

        // --- Atlases ---
        let limits = device.limits();
        let geometry = AtlasGeometry::from_config(config)
            .clamped_to(limits.max_texture_dimension_2d, limits.max_texture_array_layers);
        let resources = FrameResources::with_geometry(config, geometry, fonts)?;
        let image_texture = AtlasTexture::new(&device, "image_atlas", &geometry, IMAGE_ATLAS_FORMAT);
        let glyph_texture = AtlasTexture::new(&device, "glyph_atlas", &geometry, GLYPH_ATLAS_FORMAT);

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        // --- Frame constants ---
        let constants_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_constants"),
            size: std::mem::size_of::<FrameConstants>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bg"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: constants_buffer.as_entire_binding(),
            }],
        });

        // --- Atlas bindings ---
        let atlas_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("atlas_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let atlas_texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2Array,
                multisampled: false,
            },
            count: None,
        };
        let atlas_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("atlas_bgl"),
            entries: &[
                atlas_texture_entry(0),
                atlas_texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let atlas_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("atlas_bg"),
            layout: &atlas_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&image_texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&glyph_texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&atlas_sampler),
                },
            ],
        });

        // --- Quad pipelines ---
        let flat_pipeline = quad_pipeline(
            &device,
            "flat",
            &flat_shader(),
            &[&frame_layout],
            FlatVertex::LAYOUT,
        );
        let image_pipeline = quad_pipeline(
            &device,
            "image",
            &image_shader(),
            &[&frame_layout, &atlas_layout],
            ImageVertex::LAYOUT,
        );
        let sdf_pipeline = quad_pipeline(
            &device,
            "sdf",
            &sdf_shader(),
            &[&frame_layout, &atlas_layout],
            SdfVertex::LAYOUT,
        );

        // --- Tone mapper ---
        let tonemap_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tonemap_bgl"),
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
        let transfer = if surface_config.format.is_srgb() {
            TRANSFER_PASSTHROUGH
        } else {
            config.surface_color_space.transfer_function()
        };
        let tonemap_constants = HashMap::from([("transfer_function".to_string(), transfer)]);
        let tonemap_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tonemap_shader"),
            source: wgpu::ShaderSource::Wgsl(TONEMAP_SHADER.into()),
        });
        let tonemap_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tonemap_pipeline_layout"),
            bind_group_layouts: &[&tonemap_layout],
            push_constant_ranges: &[],
        });
        let tonemap_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("tonemap_pipeline"),
            layout: Some(&tonemap_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &tonemap_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &tonemap_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_config.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions {
                    constants: &tonemap_constants,
                    zero_initialize_workgroup_memory: false,
                },
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::ShaderCompileFailure(err.to_string()));
        }

        // --- Targets, streams and the surface ---
        surface.configure(&device, &surface_config);
        let extent = Size::new(surface_config.width as f32, surface_config.height as f32);
        let targets = RenderTargets::new(&device, &tonemap_layout, extent);
        let flat_buffer = StreamBuffer::new(&device, &resources.flat);
        let image_buffer = StreamBuffer::new(&device, &resources.image);
        let sdf_buffer = StreamBuffer::new(&device, &resources.sdf);
        let index_buffer = QuadIndexBuffer::new(&device, resources.max_quads());

        log::info!(
            "renderer ready: {:?} {}x{}, atlas {:?}, {} frames in flight",
            surface_config.format,
            surface_config.width,
            surface_config.height,
            geometry.extent(),
            config.frames_in_flight
        );

        Ok(Self {
            fences: FrameFences::new(device_lost),
            device,
            queue,
            surface,
            surface_config,
            frames_in_flight: config.frames_in_flight.max(1) as usize,
            subpixel_mode: config.subpixel_orientation.shader_mode(),
            clear_color: config.theme_mode.background(),
            constants_buffer,
            frame_bind_group,
            atlas_bind_group,
            tonemap_layout,
            flat_pipeline,
            image_pipeline,
            sdf_pipeline,
            tonemap_pipeline,
            image_texture,
            glyph_texture,
            targets,
            index_buffer,
            flat_buffer,
            image_buffer,
            sdf_buffer,
            resources,
            current: None,
            encoder: None,
        })
    }
}

fn quad_pipeline(
    device: &wgpu::Device,
    name: &str,
    source: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    vertex_layout: wgpu::VertexBufferLayout<'static>,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{name}_shader")),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{name}_pipeline_layout")),
        bind_group_layouts,
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{name}_pipeline")),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[vertex_layout],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: HDR_FORMAT,
                blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
