//! Render backends
//!
//! The renderer talks to the GPU through [`RenderBackend`]: it hands over
//! the CPU-side program buffers of each layer and asks for single picking
//! texels back. [`WgpuBackend`] renders offscreen with wgpu; [`NullBackend`]
//! draws nothing, for headless label computation and tests.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};
use wgpu::util::DeviceExt;

use crate::error::{RendererError, RendererResult};
use crate::gpu::picking::{PickingSurface, texture_extent};
use crate::gpu::shaders::program_source;
use crate::gpu::types::ProgramUniforms;
use crate::programs::{
    AttributeType, ProgramAttribute, ProgramBuffer, ProgramDefinition, ProgramKind, RenderParams,
};
use crate::transform::{Coordinates, Dimensions};

/// Visual layers, composited bottom to top
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Edges,
    Nodes,
    HoverNodes,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Edges, Layer::Nodes, Layer::HoverNodes];

    fn index(self) -> usize {
        self as usize
    }
}

/// Offscreen layers holding item fingerprints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickingLayer {
    Nodes,
    Edges,
}

impl PickingLayer {
    fn index(self) -> usize {
        self as usize
    }
}

/// What the renderer needs from a GPU
pub trait RenderBackend {
    /// Resize every target. Called before the first draw.
    fn resize(
        &mut self,
        dimensions: Dimensions,
        pixel_ratio: f64,
        downsizing_ratio: f64,
    ) -> RendererResult<()>;

    /// Compile a program. Registering twice is a no-op.
    fn register_program(&mut self, definition: &'static ProgramDefinition) -> RendererResult<()>;

    /// Clear a visual layer, then draw the buffers in order
    fn draw_layer(
        &mut self,
        layer: Layer,
        buffers: &[&ProgramBuffer],
        params: &RenderParams,
    ) -> RendererResult<()>;

    /// Clear a picking layer, then draw the buffers' fingerprints in order
    fn draw_picking(
        &mut self,
        layer: PickingLayer,
        buffers: &[&ProgramBuffer],
        params: &RenderParams,
    ) -> RendererResult<()>;

    /// Read one RGBA texel of a picking layer. `None` outside the surface.
    fn read_picking_pixel(
        &mut self,
        layer: PickingLayer,
        position: Coordinates,
    ) -> RendererResult<Option<[u8; 4]>>;
}

// ===== Null backend =====

/// Draws nothing and never picks anything
#[derive(Debug, Default, Clone)]
pub struct NullBackend;

impl RenderBackend for NullBackend {
    fn resize(
        &mut self,
        _dimensions: Dimensions,
        _pixel_ratio: f64,
        _downsizing_ratio: f64,
    ) -> RendererResult<()> {
        Ok(())
    }

    fn register_program(&mut self, _definition: &'static ProgramDefinition) -> RendererResult<()> {
        Ok(())
    }

    fn draw_layer(
        &mut self,
        _layer: Layer,
        _buffers: &[&ProgramBuffer],
        _params: &RenderParams,
    ) -> RendererResult<()> {
        Ok(())
    }

    fn draw_picking(
        &mut self,
        _layer: PickingLayer,
        _buffers: &[&ProgramBuffer],
        _params: &RenderParams,
    ) -> RendererResult<()> {
        Ok(())
    }

    fn read_picking_pixel(
        &mut self,
        _layer: PickingLayer,
        _position: Coordinates,
    ) -> RendererResult<Option<[u8; 4]>> {
        Ok(None)
    }
}

// ===== wgpu backend =====

const LAYER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Both variants of a compiled program
struct CompiledProgram {
    visual: wgpu::RenderPipeline,
    picking: wgpu::RenderPipeline,
    /// Template mesh of instanced programs
    constant: Option<wgpu::Buffer>,
}

struct Targets {
    width: u32,
    height: u32,
    layers: Vec<wgpu::Texture>,
    picking_surface: PickingSurface,
    picking: Vec<wgpu::Texture>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DrawTarget {
    Visual(Layer),
    Picking(PickingLayer),
}

/// Offscreen wgpu renderer. Layers are kept as separate textures and
/// composited on readback.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,

    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pipeline_layout: wgpu::PipelineLayout,

    programs: HashMap<ProgramKind, CompiledProgram>,
    item_buffers: HashMap<(DrawTarget, usize), wgpu::Buffer>,
    targets: Option<Targets>,
    staging_buffer: wgpu::Buffer,
}

impl WgpuBackend {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Program Bind Group Layout"),
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

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Program Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Program Uniform Buffer"),
            size: std::mem::size_of::<ProgramUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Program Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        // A single texel row, padded to the copy alignment
        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Picking Staging Buffer"),
            size: u64::from(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self {
            device,
            queue,
            uniform_buffer,
            bind_group,
            pipeline_layout,
            programs: HashMap::new(),
            item_buffers: HashMap::new(),
            targets: None,
            staging_buffer,
        }
    }

    /// Request a device and build a backend on it
    pub fn create() -> RendererResult<Self> {
        let (device, queue) = pollster::block_on(request_device())?;
        Ok(Self::new(Arc::new(device), Arc::new(queue)))
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// Size of the visual layers in physical pixels
    pub fn size(&self) -> Option<(u32, u32)> {
        self.targets
            .as_ref()
            .map(|targets| (targets.width, targets.height))
    }

    fn compile(&self, definition: &'static ProgramDefinition) -> RendererResult<CompiledProgram> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let visual = self.create_pipeline(definition, false);
        let picking = self.create_pipeline(definition, true);
        let constant = definition.is_instanced().then(|| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(definition.label),
                contents: bytemuck::cast_slice(definition.constant_data),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RendererError::ShaderCompilation {
                program: definition.label.to_string(),
                message: error.to_string(),
            });
        }

        Ok(CompiledProgram {
            visual,
            picking,
            constant,
        })
    }

    fn create_pipeline(
        &self,
        definition: &'static ProgramDefinition,
        picking: bool,
    ) -> wgpu::RenderPipeline {
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(definition.label),
            source: wgpu::ShaderSource::Wgsl(program_source(definition.shader, picking).into()),
        });

        let constant_attributes = vertex_attributes(definition.constant_attributes, 0);
        let item_attributes = vertex_attributes(
            definition.attributes,
            definition.constant_attributes.len() as u32,
        );

        let mut layouts = Vec::with_capacity(2);
        if definition.is_instanced() {
            layouts.push(wgpu::VertexBufferLayout {
                array_stride: (definition.constant_items() * 4) as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &constant_attributes,
            });
        }
        layouts.push(wgpu::VertexBufferLayout {
            array_stride: (definition.attribute_items() * 4) as u64,
            step_mode: if definition.is_instanced() {
                wgpu::VertexStepMode::Instance
            } else {
                wgpu::VertexStepMode::Vertex
            },
            attributes: &item_attributes,
        });

        // Fingerprints must reach the texture untouched
        let blend = if picking {
            None
        } else {
            Some(wgpu::BlendState::ALPHA_BLENDING)
        };

        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(definition.label),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &layouts,
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: LAYER_FORMAT,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        })
    }

    fn create_target(&self, label: &str, width: u32, height: u32) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: LAYER_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    fn upload(&mut self, target: DrawTarget, index: usize, data: &[f32]) {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let needed = bytes.len() as u64;
        let reuse = self
            .item_buffers
            .get(&(target, index))
            .is_some_and(|buffer| buffer.size() >= needed);
        if reuse {
            if let Some(buffer) = self.item_buffers.get(&(target, index)) {
                self.queue.write_buffer(buffer, 0, bytes);
            }
        } else {
            let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Program Item Buffer"),
                contents: bytes,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });
            self.item_buffers.insert((target, index), buffer);
        }
    }

    fn draw(
        &mut self,
        target: DrawTarget,
        buffers: &[&ProgramBuffer],
        params: &RenderParams,
    ) -> RendererResult<()> {
        if self.targets.is_none() {
            return Err(RendererError::Gpu("backend drawn before being sized".to_string()));
        }
        for buffer in buffers {
            if !self.programs.contains_key(&buffer.kind()) {
                return Err(RendererError::Gpu(format!(
                    "program {} is not registered",
                    buffer.definition().label
                )));
            }
        }

        let uniforms = ProgramUniforms::from(params);
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        for (index, buffer) in buffers.iter().enumerate() {
            if buffer.capacity() > 0 {
                self.upload(target, index, buffer.data());
            }
        }

        let Some(targets) = &self.targets else {
            return Ok(());
        };
        let texture = match target {
            DrawTarget::Visual(layer) => &targets.layers[layer.index()],
            DrawTarget::Picking(layer) => &targets.picking[layer.index()],
        };
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Layer Encoder"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Layer Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (index, buffer) in buffers.iter().enumerate() {
                if buffer.capacity() == 0 {
                    continue;
                }
                let (Some(program), Some(items)) =
                    (self.programs.get(&buffer.kind()), self.item_buffers.get(&(target, index)))
                else {
                    continue;
                };
                let pipeline = match target {
                    DrawTarget::Visual(_) => &program.visual,
                    DrawTarget::Picking(_) => &program.picking,
                };
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &self.bind_group, &[]);
                match &program.constant {
                    Some(constant) => {
                        render_pass.set_vertex_buffer(0, constant.slice(..));
                        render_pass.set_vertex_buffer(1, items.slice(..));
                    }
                    None => render_pass.set_vertex_buffer(0, items.slice(..)),
                }
                let (vertices, instances) = buffer.draw_counts();
                render_pass.draw(0..vertices, 0..instances);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        trace!(?target, programs = buffers.len(), "layer drawn");
        Ok(())
    }

    /// Copy a texture region into a mappable buffer and read it back
    fn read_region(
        &self,
        texture: &wgpu::Texture,
        buffer: &wgpu::Buffer,
        origin: (u32, u32),
        size: (u32, u32),
    ) -> RendererResult<Vec<u8>> {
        let (width, height) = size;
        let unpadded_bytes_per_row = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: origin.0,
                    y: origin.1,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|error| RendererError::Gpu(error.to_string()))?
            .map_err(|error| RendererError::Gpu(error.to_string()))?;

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in 0..height {
            let start = (row * padded_bytes_per_row) as usize;
            let end = start + unpadded_bytes_per_row as usize;
            pixels.extend_from_slice(&data[start..end]);
        }
        drop(data);
        buffer.unmap();

        Ok(pixels)
    }

    /// Read back a whole visual layer as RGBA rows
    pub fn read_layer_pixels(&self, layer: Layer) -> RendererResult<Vec<u8>> {
        let targets = self
            .targets
            .as_ref()
            .ok_or_else(|| RendererError::Gpu("backend has no render targets".to_string()))?;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = (targets.width * 4).div_ceil(align) * align;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Layer Staging Buffer"),
            size: u64::from(padded_bytes_per_row * targets.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        self.read_region(
            &targets.layers[layer.index()],
            &staging,
            (0, 0),
            (targets.width, targets.height),
        )
    }

    /// Flatten every visual layer over an opaque background. Layers are
    /// cleared to transparent and alpha blended, so they hold premultiplied
    /// colors.
    pub fn composite_pixels(&self, background: [u8; 3]) -> RendererResult<Vec<u8>> {
        let mut layers = Vec::with_capacity(Layer::ALL.len());
        for layer in Layer::ALL {
            layers.push(self.read_layer_pixels(layer)?);
        }
        let Some(first) = layers.first() else {
            return Ok(Vec::new());
        };
        let background = background.map(f32::from);
        let mut out: Vec<f32> = first.chunks_exact(4).flat_map(|_| background).collect();
        for layer in &layers {
            for (pixel, dst) in layer.chunks_exact(4).zip(out.chunks_exact_mut(3)) {
                let alpha = f32::from(pixel[3]) / 255.0;
                for channel in 0..3 {
                    dst[channel] = f32::from(pixel[channel]) + dst[channel] * (1.0 - alpha);
                }
            }
        }
        Ok(out
            .chunks_exact(3)
            .flat_map(|rgb| {
                let channel = |value: f32| value.round().clamp(0.0, 255.0) as u8;
                [channel(rgb[0]), channel(rgb[1]), channel(rgb[2]), 255]
            })
            .collect())
    }
}

impl RenderBackend for WgpuBackend {
    fn resize(
        &mut self,
        dimensions: Dimensions,
        pixel_ratio: f64,
        downsizing_ratio: f64,
    ) -> RendererResult<()> {
        let width = texture_extent(dimensions.width * pixel_ratio);
        let height = texture_extent(dimensions.height * pixel_ratio);
        let picking_surface = PickingSurface::new(dimensions, pixel_ratio, downsizing_ratio);

        let unchanged = self.targets.as_ref().is_some_and(|targets| {
            (targets.width, targets.height) == (width, height)
                && targets.picking_surface == picking_surface
        });
        if unchanged {
            return Ok(());
        }

        debug!(
            width,
            height,
            picking_width = picking_surface.width,
            "resizing render targets"
        );
        let layers = ["Edge Layer", "Node Layer", "Hover Layer"]
            .into_iter()
            .map(|label| self.create_target(label, width, height))
            .collect();
        let picking = ["Node Picking Layer", "Edge Picking Layer"]
            .into_iter()
            .map(|label| self.create_target(label, picking_surface.width, picking_surface.height))
            .collect();
        self.targets = Some(Targets {
            width,
            height,
            layers,
            picking_surface,
            picking,
        });
        Ok(())
    }

    fn register_program(&mut self, definition: &'static ProgramDefinition) -> RendererResult<()> {
        if self.programs.contains_key(&definition.kind) {
            return Ok(());
        }
        let program = self.compile(definition)?;
        debug!(program = definition.label, "program compiled");
        self.programs.insert(definition.kind, program);
        Ok(())
    }

    fn draw_layer(
        &mut self,
        layer: Layer,
        buffers: &[&ProgramBuffer],
        params: &RenderParams,
    ) -> RendererResult<()> {
        self.draw(DrawTarget::Visual(layer), buffers, params)
    }

    fn draw_picking(
        &mut self,
        layer: PickingLayer,
        buffers: &[&ProgramBuffer],
        params: &RenderParams,
    ) -> RendererResult<()> {
        self.draw(DrawTarget::Picking(layer), buffers, params)
    }

    fn read_picking_pixel(
        &mut self,
        layer: PickingLayer,
        position: Coordinates,
    ) -> RendererResult<Option<[u8; 4]>> {
        let Some(targets) = &self.targets else {
            return Ok(None);
        };
        let Some(texel) = targets.picking_surface.texel(position) else {
            return Ok(None);
        };
        let texture = &targets.picking[layer.index()];
        let pixels = self.read_region(texture, &self.staging_buffer, texel, (1, 1))?;
        Ok(match pixels.as_slice() {
            [r, g, b, a] => Some([*r, *g, *b, *a]),
            _ => None,
        })
    }
}

fn vertex_format(attribute: &ProgramAttribute) -> wgpu::VertexFormat {
    match (attribute.kind, attribute.size) {
        (AttributeType::PackedColor, _) => wgpu::VertexFormat::Unorm8x4,
        (AttributeType::Float, 1) => wgpu::VertexFormat::Float32,
        (AttributeType::Float, 2) => wgpu::VertexFormat::Float32x2,
        (AttributeType::Float, 3) => wgpu::VertexFormat::Float32x3,
        (AttributeType::Float, _) => wgpu::VertexFormat::Float32x4,
    }
}

/// wgpu attributes for a layout, with consecutive shader locations
fn vertex_attributes(
    attributes: &[ProgramAttribute],
    first_location: u32,
) -> Vec<wgpu::VertexAttribute> {
    let mut offset = 0;
    attributes
        .iter()
        .zip(first_location..)
        .map(|(attribute, shader_location)| {
            let vertex_attribute = wgpu::VertexAttribute {
                format: vertex_format(attribute),
                offset,
                shader_location,
            };
            offset += (attribute.items() * 4) as u64;
            vertex_attribute
        })
        .collect()
}

/// Request a GPU device and queue
pub async fn request_device() -> RendererResult<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| RendererError::Gpu("no suitable GPU adapter".to_string()))?;

    adapter
        .request_device(&wgpu::DeviceDescriptor::default(), None)
        .await
        .map_err(|error| RendererError::Gpu(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ColorCodec, color_to_index, index_to_packed};
    use crate::programs::{EDGE_ARROW_HEAD, EDGE_LINE, ItemData, NODE_CIRCLE, NodeItem};
    use crate::renderer::NodeDisplayData;
    use crate::transform::identity;

    /// Skip GPU tests on machines without an adapter
    fn create_test_backend() -> Option<WgpuBackend> {
        WgpuBackend::create().ok()
    }

    fn params(width: f64, height: f64) -> RenderParams {
        RenderParams {
            width,
            height,
            pixel_ratio: 1.0,
            // Framed graph (0..1) to clip space (-1..1)
            matrix: [2.0, 0.0, 0.0, 0.0, 2.0, 0.0, -1.0, -1.0, 1.0],
            inverse_matrix: identity(),
            camera_angle: 0.0,
            zoom_ratio: 1.0,
            size_ratio: 1.0,
            // One node size unit per pixel
            correction_ratio: 1.0 / (2.0 * width),
            downsizing_ratio: 1.0,
            min_edge_thickness: 1.7,
            anti_aliasing_feather: 1.0,
            arrow_head_length_ratio: 2.5,
            arrow_head_wideness_ratio: 0.66,
        }
    }

    fn node(size: f64) -> NodeDisplayData {
        NodeDisplayData {
            x: 0.5,
            y: 0.5,
            size,
            color: "#ff0000".to_string(),
            label: None,
            node_type: "circle".to_string(),
            hidden: false,
            highlighted: false,
            force_label: false,
            z_index: 0.0,
        }
    }

    #[test]
    fn vertex_attributes_are_packed() {
        let attributes = vertex_attributes(EDGE_LINE.attributes, 0);
        let offsets: Vec<u64> = attributes
            .iter()
            .map(|attribute| attribute.offset)
            .collect();
        assert_eq!(offsets, vec![0, 8, 16, 24, 28, 32, 36]);
        assert_eq!(attributes[5].format, wgpu::VertexFormat::Unorm8x4);

        let attributes = vertex_attributes(NODE_CIRCLE.attributes, 1);
        assert_eq!(attributes[0].shader_location, 1);
        assert_eq!(attributes[0].format, wgpu::VertexFormat::Float32x2);
    }

    #[test]
    fn null_backend_picks_nothing() {
        let mut backend = NullBackend;
        backend
            .resize(Dimensions::new(10.0, 10.0), 1.0, 1.0)
            .unwrap();
        let picked = backend
            .read_picking_pixel(PickingLayer::Nodes, Coordinates::new(5.0, 5.0))
            .unwrap();
        assert_eq!(picked, None);
    }

    #[test]
    fn programs_compile() {
        let Some(mut backend) = create_test_backend() else {
            return;
        };
        for definition in [&NODE_CIRCLE, &EDGE_LINE, &EDGE_ARROW_HEAD] {
            backend.register_program(definition).unwrap();
        }
    }

    #[test]
    fn picking_a_node_returns_its_fingerprint() {
        let Some(mut backend) = create_test_backend() else {
            return;
        };
        backend
            .resize(Dimensions::new(64.0, 64.0), 1.0, 1.0)
            .unwrap();
        backend.register_program(&NODE_CIRCLE).unwrap();

        let data = node(10.0);
        let mut buffer = ProgramBuffer::new(ProgramKind::NodeCircle);
        buffer.reallocate(1);
        let item = ItemData::Node(NodeItem::new(&data, Coordinates::new(0.5, 0.5)));
        let color = ColorCodec::new().packed(&data.color);
        buffer.process(0, &item, color, index_to_packed(42));

        backend
            .draw_picking(PickingLayer::Nodes, &[&buffer], &params(64.0, 64.0))
            .unwrap();
        let center = backend
            .read_picking_pixel(PickingLayer::Nodes, Coordinates::new(32.0, 32.0))
            .unwrap()
            .unwrap();
        assert_eq!(color_to_index(center), 42);
        let corner = backend
            .read_picking_pixel(PickingLayer::Nodes, Coordinates::new(1.0, 1.0))
            .unwrap()
            .unwrap();
        assert_eq!(color_to_index(corner), 0);
    }

    #[test]
    fn visual_layer_shows_the_node() {
        let Some(mut backend) = create_test_backend() else {
            return;
        };
        backend
            .resize(Dimensions::new(32.0, 32.0), 1.0, 1.0)
            .unwrap();
        backend.register_program(&NODE_CIRCLE).unwrap();

        let data = node(6.0);
        let mut buffer = ProgramBuffer::new(ProgramKind::NodeCircle);
        buffer.reallocate(1);
        let item = ItemData::Node(NodeItem::new(&data, Coordinates::new(0.5, 0.5)));
        let color = ColorCodec::new().packed(&data.color);
        buffer.process(0, &item, color, index_to_packed(1));
        let params = params(32.0, 32.0);
        backend
            .draw_layer(Layer::Nodes, &[&buffer], &params)
            .unwrap();
        backend.draw_layer(Layer::Edges, &[], &params).unwrap();
        backend.draw_layer(Layer::HoverNodes, &[], &params).unwrap();

        let pixels = backend.composite_pixels([255, 255, 255]).unwrap();
        assert_eq!(pixels.len(), 32 * 32 * 4);
        let center = &pixels[(16 * 32 + 16) * 4..(16 * 32 + 16) * 4 + 4];
        let red = center[0] > 200 && center[1] < 60 && center[2] < 60;
        assert!(red, "center pixel {center:?}");
        assert_eq!(&pixels[..4], &[255, 255, 255, 255]);
    }
}
