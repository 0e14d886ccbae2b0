use crate::primitiverenderer::Color;

use super::primitiverenderer::{PrimitiveRenderer, PrimitiveType, Vertex2C};

pub struct ShapeRenderer {
    pr: PrimitiveRenderer,
    current_shape_type: Option<PrimitiveType>,
}

impl ShapeRenderer {
    pub fn new(gl: &glow::Context) -> Self {
        Self {
            pr: PrimitiveRenderer::new(gl, 1_000_000),
            current_shape_type: None,
        }
    }

    pub fn set_mvp(&mut self, mvp: nalgebra::Matrix4<f32>) {
        self.pr.set_mvp(mvp);
    }

    pub fn begin(&mut self, pt: PrimitiveType) {
        self.current_shape_type = Some(pt);
        self.pr.begin(pt);
    }

    pub fn end(&mut self) {
        self.pr.end();
        self.current_shape_type = None;
    }

    pub fn flush(&mut self, gl: &glow::Context) {
        self.pr.flush(gl);
    }

    fn check(&mut self, desired_type: PrimitiveType, other: PrimitiveType, _n_vertices: usize) {
        if let Some(pt) = self.current_shape_type {
            if pt != desired_type && pt != other {
                self.end();
                self.begin(desired_type);
            }
        } else {
            panic!("begin() must be called first");
        }
    }

    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Color) {
        self.check(PrimitiveType::Line, PrimitiveType::Point, 2);

        self.pr.xyc(x1, y1, color);
        self.pr.xyc(x2, y2, color);
    }

    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) {
        self.check(PrimitiveType::Line, PrimitiveType::Filled, 8);

        match self.current_shape_type {
            Some(PrimitiveType::Line) => {
                self.pr.xyc(x, y, color);
                self.pr.xyc(x + width, y, color);
                self.pr.xyc(x + width, y, color);
                self.pr.xyc(x + width, y + height, color);
                self.pr.xyc(x + width, y + height, color);
                self.pr.xyc(x, y + height, color);
                self.pr.xyc(x, y + height, color);
                self.pr.xyc(x, y, color);
            }
            Some(PrimitiveType::Filled) => {
                self.pr.xyc(x, y, color);
                self.pr.xyc(x + width, y, color);
                self.pr.xyc(x + width, y + height, color);
                self.pr.xyc(x + width, y + height, color);
                self.pr.xyc(x, y + height, color);
                self.pr.xyc(x, y, color);
            }
            _ => {}
        }
    }

    pub fn circle(&mut self, x: f32, y: f32, radius: f32, color: Color) {
        let number_of_segments = 1.max((4.0 * 12.0 * radius.cbrt()) as usize);
        self.circle_segments(x, y, radius, color, number_of_segments);
    }

    fn circle_segments(&mut self, x: f32, y: f32, radius: f32, color: Color, number_of_segments: usize) {
        let angle_per_segment = 2.0 * std::f32::consts::PI / number_of_segments as f32;
        let (s, c) = angle_per_segment.sin_cos();

        let mut px: f32 = radius;
        let mut py: f32 = 0.0;

        match self.current_shape_type {
            Some(PrimitiveType::Line) => {
                for _ in 0..number_of_segments {
                    self.pr.xyc(x + px, y + py, color);
                    (px, py) = (c * px - s * py, s * px + c * py);
                    self.pr.xyc(x + px, y + py, color);
                }
            }
            Some(PrimitiveType::Filled) => {
                for _ in 0..number_of_segments {
                    self.pr.xyc(x, y, color);
                    self.pr.xyc(x + px, y + py, color);
                    (px, py) = (c * px - s * py, s * px + c * py);
                    self.pr.xyc(x + px, y + py, color);
                }
            }
            _ => {}
        }
    }

    /// Draws an arrow pointing in `angle_rad`, used to visualize a `Pose2`.
    pub fn arrow(&mut self, x: f32, y: f32, angle_rad: f32, radius: f32, color: Color) {
        let (s, c) = angle_rad.sin_cos();

        let (a_sin, a_cos) = 45f32.to_radians().sin_cos();

        let left_cos = -a_sin * s - a_cos * c;
        let left_sin = a_sin * c - a_cos * s;
        let right_cos = a_sin * s - a_cos * c;
        let right_sin = a_sin * -c - a_cos * s;

        match self.current_shape_type {
            Some(PrimitiveType::Filled) => {
                self.pr.xyc(x + c * radius, y + s * radius, color);
                self.pr.xyc(x + left_cos * radius, y + left_sin * radius, color);
                self.pr.xyc(x - c * (radius / 3.0), y - s * (radius / 3.0), color);
                self.pr.xyc(x - c * (radius / 3.0), y - s * (radius / 3.0), color);
                self.pr.xyc(x + right_cos * radius, y + right_sin * radius, color);
                self.pr.xyc(x + c * radius, y + s * radius, color);
            }
            Some(PrimitiveType::Line) => {
                self.pr.xyc(x + c * radius, y + s * radius, color);
                self.pr.xyc(x + left_cos * radius, y + left_sin * radius, color);
                self.pr.xyc(x + left_cos * radius, y + left_sin * radius, color);
                self.pr.xyc(x - c * (radius / 3.0), y - s * (radius / 3.0), color);
                self.pr.xyc(x - c * (radius / 3.0), y - s * (radius / 3.0), color);
                self.pr.xyc(x + right_cos * radius, y + right_sin * radius, color);
                self.pr.xyc(x + right_cos * radius, y + right_sin * radius, color);
                self.pr.xyc(x + c * radius, y + s * radius, color);
            }
            _ => {}
        }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        self.pr.destroy(gl);
    }
}
