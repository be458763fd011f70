use crate::geometry::{PrimitiveKind, VertexLayout};

pub(crate) const VERTEX_SHADER: &str = include_str!("shaders/slide_projector.vert.wgsl");
pub(crate) const FRAGMENT_SHADER: &str = include_str!("shaders/slide_projector.frag.wgsl");

pub(crate) const FRAGMENT_ENTRY_POINT: &str = "fs_main";

/// Vertex entry point that consumes `layout`.
pub(crate) fn vertex_entry_point(layout: VertexLayout) -> &'static str {
    match layout {
        VertexLayout::Position => "vs_position",
        VertexLayout::PositionNormal => "vs_position_normal",
        VertexLayout::PositionUv => "vs_position_uv",
        VertexLayout::PositionNormalUv => "vs_position_normal_uv",
    }
}

pub(crate) const ALL_LAYOUTS: [VertexLayout; 4] = [
    VertexLayout::Position,
    VertexLayout::PositionNormal,
    VertexLayout::PositionUv,
    VertexLayout::PositionNormalUv,
];

pub(crate) const ALL_PRIMITIVES: [PrimitiveKind; 2] =
    [PrimitiveKind::LineList, PrimitiveKind::TriangleList];

/// Background colour of the window.
pub(crate) const CLEAR_COLOR: [f64; 4] = [0.1, 0.1, 0.1, 1.0];
