// In src/geom/bbox.rs

use crate::runtime::Value;

/// 轴对齐包围盒。二维包围盒的 z 范围为 0。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub xmin: f64,
    pub ymin: f64,
    pub zmin: f64,
    pub xmax: f64,
    pub ymax: f64,
    pub zmax: f64,
}

impl BBox {
    pub fn empty2() -> Self {
        Self {
            xmin: f64::INFINITY,
            ymin: f64::INFINITY,
            zmin: 0.0,
            xmax: f64::NEG_INFINITY,
            ymax: f64::NEG_INFINITY,
            zmax: 0.0,
        }
    }

    pub fn empty3() -> Self {
        Self {
            zmin: f64::INFINITY,
            zmax: f64::NEG_INFINITY,
            ..Self::empty2()
        }
    }

    pub fn infinite2() -> Self {
        Self {
            xmin: f64::NEG_INFINITY,
            ymin: f64::NEG_INFINITY,
            zmin: 0.0,
            xmax: f64::INFINITY,
            ymax: f64::INFINITY,
            zmax: 0.0,
        }
    }

    pub fn infinite3() -> Self {
        Self {
            zmin: f64::NEG_INFINITY,
            zmax: f64::INFINITY,
            ..Self::infinite2()
        }
    }

    /// `[[xmin,ymin],[xmax,ymax]]` 或 `[[xmin,ymin,zmin],[xmax,ymax,zmax]]`。
    pub fn from_value(value: &Value) -> Option<Self> {
        let Value::List(corners) = value else {
            return None;
        };
        let [min, max] = &corners[..] else {
            return None;
        };
        match (min.as_numbers()?.as_slice(), max.as_numbers()?.as_slice()) {
            (&[xmin, ymin], &[xmax, ymax]) => Some(Self {
                xmin,
                ymin,
                zmin: 0.0,
                xmax,
                ymax,
                zmax: 0.0,
            }),
            (&[xmin, ymin, zmin], &[xmax, ymax, zmax]) => Some(Self {
                xmin,
                ymin,
                zmin,
                xmax,
                ymax,
                zmax,
            }),
            _ => None,
        }
    }

    pub fn size2(&self) -> [f64; 2] {
        [self.xmax - self.xmin, self.ymax - self.ymin]
    }

    pub fn size3(&self) -> [f64; 3] {
        [
            self.xmax - self.xmin,
            self.ymax - self.ymin,
            self.zmax - self.zmin,
        ]
    }
}

impl Default for BBox {
    fn default() -> Self {
        Self::infinite3()
    }
}
