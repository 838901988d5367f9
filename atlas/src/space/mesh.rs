use nalgebra::{Matrix4, Point3};

/// 变换后点坐标的取反策略。数据源之间的坐标手性不一致，
/// 按约定默认取反Y、Z两轴。
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AxisFlip {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl AxisFlip {
    pub const NONE: AxisFlip = AxisFlip {
        x: false,
        y: false,
        z: false,
    };

    #[inline]
    pub fn apply(self, p: &mut Point3<f64>) {
        if self.x {
            p.x = -p.x;
        }
        if self.y {
            p.y = -p.y;
        }
        if self.z {
            p.z = -p.z;
        }
    }
}

impl Default for AxisFlip {
    #[inline]
    fn default() -> Self {
        Self {
            x: false,
            y: true,
            z: true,
        }
    }
}

/// 多边形连接结构，保持VTK legacy形式：单元个数加上
/// `[n, i0, .., i(n-1), n, ..]`的扁平顶点索引表。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PolyConnectivity {
    pub num_cells: u32,
    pub vertices: Vec<u32>,
}

/// 三角网格：有序点列加多边形连接。
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub points: Vec<Point3<f64>>,
    pub polys: PolyConnectivity,
}

impl Mesh {
    #[inline]
    pub fn new(points: Vec<Point3<f64>>, polys: PolyConnectivity) -> Self {
        Self { points, polys }
    }

    #[inline]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// 把每个点做齐次仿射变换后按策略取反坐标轴，面连接替换为图谱的。
    /// 点数与图谱网格不一致时，继承来的面索引会失效，直接中止。
    pub fn into_atlas_space(
        self,
        transform: &Matrix4<f64>,
        flip: AxisFlip,
        atlas_points: usize,
        atlas_polys: &PolyConnectivity,
    ) -> Mesh {
        assert_eq!(
            self.points.len(),
            atlas_points,
            "mesh has {} points but the atlas mesh has {}; atlas faces would be invalid",
            self.points.len(),
            atlas_points,
        );
        let points = self
            .points
            .into_iter()
            .map(|p| {
                let mut q = transform.transform_point(&p);
                flip.apply(&mut q);
                q
            })
            .collect();
        Mesh {
            points,
            polys: atlas_polys.clone(),
        }
    }
}
