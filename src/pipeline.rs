//! Pipeline selection. A primitive's pipeline is a pure function of its
//! material flags and whether it is skinned; pipeline objects themselves
//! are opaque handles stored in a table indexed by that key.

use crate::error::{Result, ResultExt};
use crate::material::AlphaMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineKey {
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
    pub rigged: bool,
}

impl PipelineKey {
    pub const COUNT: usize = 12;

    pub fn all() -> impl Iterator<Item = PipelineKey> {
        [AlphaMode::Opaque, AlphaMode::Mask, AlphaMode::Blend]
            .into_iter()
            .flat_map(|alpha_mode| {
                [false, true].into_iter().flat_map(move |double_sided| {
                    [false, true].into_iter().map(move |rigged| PipelineKey {
                        alpha_mode,
                        double_sided,
                        rigged,
                    })
                })
            })
    }

    pub fn index(self) -> usize {
        let alpha = match self.alpha_mode {
            AlphaMode::Opaque => 0,
            AlphaMode::Mask => 1,
            AlphaMode::Blend => 2,
        };
        alpha * 4 + usize::from(self.double_sided) * 2 + usize::from(self.rigged)
    }
}

/// One pipeline handle per [`PipelineKey`].
pub struct PipelineTable<P> {
    pipelines: Vec<P>,
}

impl<P> PipelineTable<P> {
    pub fn build(mut create: impl FnMut(PipelineKey) -> Result<P>) -> Result<Self> {
        let pipelines = PipelineKey::all()
            .map(|key| create(key).with_context(|| format!("create pipeline {key:?}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { pipelines })
    }

    pub fn get(&self, key: PipelineKey) -> &P {
        &self.pipelines[key.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};

    #[test]
    fn index_matches_enumeration_order() {
        for (i, key) in PipelineKey::all().enumerate() {
            assert_eq!(key.index(), i);
        }
        assert_eq!(PipelineKey::all().count(), PipelineKey::COUNT);
    }

    #[test]
    fn table_returns_pipeline_built_for_key() {
        let table = PipelineTable::build(|key| Ok(key)).unwrap();
        let key = PipelineKey {
            alpha_mode: AlphaMode::Mask,
            double_sided: true,
            rigged: false,
        };
        assert_eq!(*table.get(key), key);
    }

    #[test]
    fn build_failure_names_key() {
        let err = PipelineTable::<()>::build(|key| {
            if key.alpha_mode == AlphaMode::Blend {
                Err(Error::allocation("shader"))
            } else {
                Ok(())
            }
        })
        .err()
        .unwrap();

        assert!(matches!(err.kind, ErrorKind::AllocationFailed(_)));
        assert!(err.trace[0].contains("Blend"));
    }
}
