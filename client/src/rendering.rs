//! Scene composition on top of a minimal drawing surface
//!
//! [`draw_scene`] turns the client state into draw calls against a
//! [`Canvas`]. The binary draws through [`MacroquadCanvas`]; tests record the
//! calls instead.

use crate::game::ClientGameState;
use crate::network::ConnectionStatus;
use macroquad::prelude as mq;
use shared::{MobKind, Vec2, WORLD_HEIGHT, WORLD_WIDTH};

const GRID_SIZE: f32 = 50.0;
const PLAYER_RADIUS: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub u8, pub u8, pub u8, pub u8);

pub const OUT_OF_BOUNDS: Rgba = Rgba(255, 0, 0, 255);
pub const GROUND: Rgba = Rgba(34, 139, 34, 255);
pub const GRID: Rgba = Rgba(28, 115, 28, 255);
pub const LOCAL_PLAYER: Rgba = Rgba(255, 230, 80, 255);
pub const REMOTE_PLAYER: Rgba = Rgba(255, 170, 60, 255);
pub const OUTLINE: Rgba = Rgba(0, 0, 0, 255);
pub const TEXT: Rgba = Rgba(255, 255, 255, 255);

pub trait Canvas {
    fn clear(&mut self, color: Rgba);
    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba);
    fn line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, thickness: f32, color: Rgba);
    fn circle(&mut self, x: f32, y: f32, radius: f32, color: Rgba);
    fn text(&mut self, text: &str, x: f32, y: f32, size: f32, color: Rgba);
}

#[derive(Debug)]
pub struct MobStyle {
    pub radius: f32,
    pub fill: Rgba,
}

static MOB_STYLES: [MobStyle; 2] = [
    // Ladybug
    MobStyle {
        radius: 15.0,
        fill: Rgba(220, 30, 30, 255),
    },
    // Bubble
    MobStyle {
        radius: 10.0,
        fill: Rgba(170, 220, 255, 200),
    },
];

pub fn mob_style(kind: MobKind) -> &'static MobStyle {
    &MOB_STYLES[kind.wire_id() as usize]
}

/// Top-left corner of the viewport in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
}

impl Camera {
    /// Centers on `target`, clamped so the viewport stays inside the world.
    pub fn follow(target: Vec2, viewport_width: f32, viewport_height: f32) -> Self {
        let max_x = (WORLD_WIDTH - viewport_width).max(0.0);
        let max_y = (WORLD_HEIGHT - viewport_height).max(0.0);

        Self {
            x: (target.x - viewport_width / 2.0).clamp(0.0, max_x),
            y: (target.y - viewport_height / 2.0).clamp(0.0, max_y),
        }
    }

    pub fn to_screen(&self, world: Vec2) -> (f32, f32) {
        (world.x - self.x, world.y - self.y)
    }
}

pub fn draw_scene<C: Canvas>(
    canvas: &mut C,
    state: &ClientGameState,
    status: ConnectionStatus,
    viewport: (f32, f32),
) {
    let (width, height) = viewport;
    let camera = Camera::follow(state.local_position(), width, height);

    canvas.clear(OUT_OF_BOUNDS);
    draw_ground_and_grid(canvas, &camera);

    for mob in state.mobs.as_slice() {
        let style = mob_style(mob.kind);
        let (x, y) = camera.to_screen(mob.position);
        canvas.circle(x, y, style.radius + 2.0, OUTLINE);
        canvas.circle(x, y, style.radius, style.fill);
    }

    for (_, player) in state.remote.iter() {
        draw_player(canvas, &camera, player.position, REMOTE_PLAYER);
    }
    draw_player(canvas, &camera, state.local_position(), LOCAL_PLAYER);

    let status_line = format!(
        "{:?} | players: {} | mobs: {}",
        status,
        state.remote.len() + 1,
        state.mobs.len()
    );
    canvas.text(&status_line, 10.0, 20.0, 20.0, TEXT);
}

fn draw_ground_and_grid<C: Canvas>(canvas: &mut C, camera: &Camera) {
    canvas.rect(-camera.x, -camera.y, WORLD_WIDTH, WORLD_HEIGHT, GROUND);

    let mut x = 0.0;
    while x <= WORLD_WIDTH {
        canvas.line(x - camera.x, -camera.y, x - camera.x, WORLD_HEIGHT - camera.y, 1.0, GRID);
        x += GRID_SIZE;
    }

    let mut y = 0.0;
    while y <= WORLD_HEIGHT {
        canvas.line(-camera.x, y - camera.y, WORLD_WIDTH - camera.x, y - camera.y, 1.0, GRID);
        y += GRID_SIZE;
    }
}

fn draw_player<C: Canvas>(canvas: &mut C, camera: &Camera, position: Vec2, color: Rgba) {
    let (x, y) = camera.to_screen(position);
    canvas.circle(x, y, PLAYER_RADIUS + 2.0, OUTLINE);
    canvas.circle(x, y, PLAYER_RADIUS, color);
}

/// Draws straight to the macroquad window.
pub struct MacroquadCanvas;

impl MacroquadCanvas {
    fn color(color: Rgba) -> mq::Color {
        mq::Color::from_rgba(color.0, color.1, color.2, color.3)
    }
}

impl Canvas for MacroquadCanvas {
    fn clear(&mut self, color: Rgba) {
        mq::clear_background(Self::color(color));
    }

    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba) {
        mq::draw_rectangle(x, y, w, h, Self::color(color));
    }

    fn line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, thickness: f32, color: Rgba) {
        mq::draw_line(x0, y0, x1, y1, thickness, Self::color(color));
    }

    fn circle(&mut self, x: f32, y: f32, radius: f32, color: Rgba) {
        mq::draw_circle(x, y, radius, Self::color(color));
    }

    fn text(&mut self, text: &str, x: f32, y: f32, size: f32, color: Rgba) {
        mq::draw_text(text, x, y, size, Self::color(color));
    }
}
