//! Renders into real WebGL 2.0 contexts and checks the resulting pixels.
//!
//! Run with `wasm-pack test --headless --firefox` (or `--chrome`).
#![cfg(target_arch = "wasm32")]

use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use web_sys::{HtmlCanvasElement, WebGl2RenderingContext as Gl};

use web_glitz_submit::buffer::BufferDescriptor;
use web_glitz_submit::f32_bytes;
use web_glitz_submit::image::format::TextureFormat;
use web_glitz_submit::image::texture::{TextureDescriptor, TextureDimension};
use web_glitz_submit::pipeline::{DepthTest, PipelineId, RenderPipelineDescriptor};
use web_glitz_submit::rendering::{
    BlitFramebufferPass, BlitMask, ColorAttachment, CommandEncoder, DepthStencilAttachment,
    FramebufferAttachments, Rect, RenderObject, RenderPassDescriptor, RenderPassEncoder,
    Submission,
};
use web_glitz_submit::runtime::{webgl2_context, ContextOptions, RenderDevice, WebGl2Context};
use web_glitz_submit::sampler::FilterMode;
use web_glitz_submit::vertex::{VertexAttribute, VertexFormat};

wasm_bindgen_test_configure!(run_in_browser);

const SIZE: u32 = 16;

const VERTEX_SHADER: &str = "#version 300 es
in vec2 position;
uniform float depth;

void main() {
    gl_Position = vec4(position, depth, 1.0);
}
";

const FRAGMENT_SHADER: &str = "#version 300 es
precision mediump float;

uniform vec4 color;
out vec4 out_color;

void main() {
    out_color = color;
}
";

const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

fn device(options: ContextOptions) -> RenderDevice<WebGl2Context> {
    let canvas: HtmlCanvasElement = web_sys::window()
        .and_then(|window| window.document())
        .and_then(|document| document.create_element("canvas").ok())
        .and_then(|element| element.dyn_into().ok())
        .expect("failed to create a canvas");

    canvas.set_width(SIZE);
    canvas.set_height(SIZE);

    RenderDevice::new(webgl2_context(&canvas, &options).expect("WebGL 2.0 is unavailable"))
}

/// Reads a pixel of the canvas. Rebinds the read framebuffer behind the device's back, so call
/// this only after the last submission of a test.
fn canvas_pixel(device: &RenderDevice<WebGl2Context>, x: i32, y: i32) -> [u8; 4] {
    let gl = device.context().gl();
    let mut pixel = [0u8; 4];

    gl.bind_framebuffer(Gl::READ_FRAMEBUFFER, None);
    gl.read_pixels_with_opt_u8_array(x, y, 1, 1, Gl::RGBA, Gl::UNSIGNED_BYTE, Some(&mut pixel))
        .expect("failed to read pixels");

    pixel
}

/// A triangle that covers the whole target.
fn fullscreen(
    device: &mut RenderDevice<WebGl2Context>,
    pipeline: PipelineId,
    color: [f32; 4],
    depth: f32,
) -> RenderObject {
    let positions = device.create_buffer(BufferDescriptor::vertex(f32_bytes(&[
        -1.0, -1.0, 3.0, -1.0, -1.0, 3.0,
    ])));

    RenderObject::new(pipeline)
        .attribute(
            "position",
            VertexAttribute::new(positions, VertexFormat::Float32x2),
        )
        .binding("color", color)
        .binding("depth", depth)
}

fn submit(device: &mut RenderDevice<WebGl2Context>, pass: RenderPassEncoder) {
    device
        .submit(&Submission::new().encoder(CommandEncoder::new().pass(pass)))
        .expect("submission failed");
}

#[wasm_bindgen_test]
fn test_clear_canvas() {
    let mut device = device(ContextOptions::default());

    submit(
        &mut device,
        RenderPassEncoder::new(
            RenderPassDescriptor::new().color_attachment(ColorAttachment::canvas().clear(BLUE)),
        ),
    );

    assert_eq!(canvas_pixel(&device, 8, 8), [0, 0, 255, 255]);
}

#[wasm_bindgen_test]
fn test_last_draw_wins() {
    let mut device = device(ContextOptions::default());
    let pipeline =
        device.create_pipeline(RenderPipelineDescriptor::new(VERTEX_SHADER, FRAGMENT_SHADER));
    let red = fullscreen(&mut device, pipeline, RED, 0.0);
    let green = fullscreen(&mut device, pipeline, GREEN, 0.0);

    submit(
        &mut device,
        RenderPassEncoder::new(
            RenderPassDescriptor::new().color_attachment(ColorAttachment::canvas().clear(BLUE)),
        )
        .object(red)
        .object(green),
    );

    assert_eq!(canvas_pixel(&device, 4, 4), [0, 255, 0, 255]);
}

#[wasm_bindgen_test]
fn test_depth_test_keeps_the_nearest_draw() {
    let mut device = device(ContextOptions::begin().enable_depth().finish());
    let pipeline = device.create_pipeline(
        RenderPipelineDescriptor::new(VERTEX_SHADER, FRAGMENT_SHADER)
            .depth_test(DepthTest::default()),
    );
    let near = fullscreen(&mut device, pipeline, RED, -0.5);
    let far = fullscreen(&mut device, pipeline, GREEN, 0.5);

    submit(
        &mut device,
        RenderPassEncoder::new(
            RenderPassDescriptor::new()
                .color_attachment(ColorAttachment::canvas().clear(BLUE))
                .depth_stencil_attachment(DepthStencilAttachment::canvas().clear_depth(1.0)),
        )
        .object(near)
        .object(far),
    );

    assert_eq!(canvas_pixel(&device, 4, 4), [255, 0, 0, 255]);
}

#[wasm_bindgen_test]
fn test_multisampled_render_to_texture() {
    // Blitting into a multisampled default framebuffer is invalid.
    let mut device = device(ContextOptions::begin().disable_antialias().finish());
    let pipeline =
        device.create_pipeline(RenderPipelineDescriptor::new(VERTEX_SHADER, FRAGMENT_SHADER));
    let texture = device.create_texture(
        TextureDescriptor::new(TextureFormat::RGBA8, TextureDimension::D2).size(SIZE, SIZE),
    );
    let green = fullscreen(&mut device, pipeline, GREEN, 0.0);
    let full = Rect::new(0, 0, SIZE, SIZE);

    let render = RenderPassEncoder::new(
        RenderPassDescriptor::new()
            .color_attachment(ColorAttachment::new(texture).clear(RED))
            .sample_count(4),
    )
    .object(green);
    let present = BlitFramebufferPass {
        source: FramebufferAttachments::new().color(texture),
        destination: FramebufferAttachments::canvas(),
        source_rect: full,
        destination_rect: full,
        mask: BlitMask::COLOR,
        filter: FilterMode::Nearest,
    };

    device
        .submit(
            &Submission::new().encoder(CommandEncoder::new().pass(render).pass(present)),
        )
        .expect("submission failed");

    assert_eq!(canvas_pixel(&device, 4, 4), [0, 255, 0, 255]);
}
