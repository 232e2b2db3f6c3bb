// In src/codegen/types.rs

use std::fmt;

/// 着色器中的值类型。几何编译器只产生这几种。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlType {
    Bool,
    Num,
    Vec2,
    Vec3,
    Vec4,
}

impl GlType {
    /// 数值类型的分量个数；`bool` 没有分量。
    pub fn count(self) -> Option<usize> {
        match self {
            GlType::Bool => None,
            GlType::Num => Some(1),
            GlType::Vec2 => Some(2),
            GlType::Vec3 => Some(3),
            GlType::Vec4 => Some(4),
        }
    }

    /// 由分量个数得到数值类型：1 是 `float`，2..=4 是向量。
    pub fn with_count(count: usize) -> Option<GlType> {
        match count {
            1 => Some(GlType::Num),
            2 => Some(GlType::Vec2),
            3 => Some(GlType::Vec3),
            4 => Some(GlType::Vec4),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        self != GlType::Bool
    }

    pub fn is_vec(self) -> bool {
        matches!(self, GlType::Vec2 | GlType::Vec3 | GlType::Vec4)
    }
}

impl fmt::Display for GlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GlType::Bool => "bool",
            GlType::Num => "float",
            GlType::Vec2 => "vec2",
            GlType::Vec3 => "vec3",
            GlType::Vec4 => "vec4",
        };
        f.write_str(name)
    }
}
