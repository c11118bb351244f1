//! Instance batches handed to the renderer.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Per-instance data for GPU upload: the column-major draw matrix.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    /// World matrix times model matrix, column-major.
    pub model: [[f32; 4]; 4],
}

impl InstanceData {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Wraps a draw matrix.
    #[inline]
    #[must_use]
    pub fn from_matrix(matrix: &Mat4) -> Self {
        Self {
            model: matrix.to_cols_array_2d(),
        }
    }

    /// The draw matrix.
    #[inline]
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model)
    }
}

/// All visible instances of one mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceBatch {
    /// Mesh key.
    pub mesh: String,
    /// Visible instances, in instance-list order.
    pub instances: Vec<InstanceData>,
}

impl InstanceBatch {
    /// Raw bytes of the instance array.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }
}

/// Counters from one batch build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Meshes with at least one visible instance.
    pub batches: usize,
    /// Instances that passed culling.
    pub visible: usize,
    /// Instances rejected by culling.
    pub culled: usize,
    /// Instance-list ids with no geometry entry.
    pub stale: usize,
}

impl BatchStats {
    /// Fraction of tested instances that were culled.
    #[must_use]
    pub fn cull_ratio(&self) -> f32 {
        let tested = self.visible + self.culled;
        if tested == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let ratio = self.culled as f32 / tested as f32;
            ratio
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_instance_layout() {
        assert_eq!(InstanceData::SIZE, 64);
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let data = InstanceData::from_matrix(&m);
        assert_eq!(data.model[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(data.matrix(), m);

        let batch = InstanceBatch {
            mesh: "crate".into(),
            instances: vec![data, data],
        };
        assert_eq!(batch.as_bytes().len(), 128);
    }

    #[test]
    fn test_cull_ratio() {
        assert_eq!(BatchStats::default().cull_ratio(), 0.0);
        let stats = BatchStats {
            visible: 3,
            culled: 1,
            ..BatchStats::default()
        };
        assert!((stats.cull_ratio() - 0.25).abs() < f32::EPSILON);
    }
}
