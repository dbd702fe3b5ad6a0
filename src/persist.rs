//! Versioned JSON documents for patches and whole engine state.
//!
//! Documents carry only persisted attributes. After decoding, a patch has no
//! back-references and no resolved samples; [`Patch::relink`] rebuilds both,
//! and must run after the referenced samples are registered.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    engine::EngineConfig,
    error::{SamplerError, SamplerResult},
    patch::Patch,
    sample::SampleDescriptor,
};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct PatchDocument<P = Patch> {
    pub version: u32,
    pub patch: P,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EngineStateDocument<P = Patch> {
    pub version: u32,
    pub config: EngineConfig,
    /// Samples registered when the state was saved, so a loader can
    /// re-register them before restoring.
    pub samples: Vec<SampleDescriptor>,
    pub patch: P,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

fn check_version(json: &str) -> SamplerResult<()> {
    let probe: VersionProbe = serde_json::from_str(json)?;
    if probe.version != FORMAT_VERSION {
        return Err(SamplerError::UnsupportedVersion {
            found: probe.version,
            expected: FORMAT_VERSION,
        });
    }
    Ok(())
}

pub fn patch_to_json(patch: &Patch) -> SamplerResult<String> {
    let doc = PatchDocument {
        version: FORMAT_VERSION,
        patch,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Decode a patch document. The result still needs [`Patch::relink`].
pub fn patch_from_json(json: &str) -> SamplerResult<Patch> {
    check_version(json)?;
    let doc: PatchDocument = serde_json::from_str(json)?;
    Ok(doc.patch)
}

pub fn state_to_json(
    config: &EngineConfig,
    samples: Vec<SampleDescriptor>,
    patch: &Patch,
) -> SamplerResult<String> {
    let doc = EngineStateDocument {
        version: FORMAT_VERSION,
        config: *config,
        samples,
        patch,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

pub fn state_from_json(json: &str) -> SamplerResult<EngineStateDocument> {
    check_version(json)?;
    Ok(serde_json::from_str(json)?)
}

pub fn save_patch_file(path: impl AsRef<Path>, patch: &Patch) -> SamplerResult<()> {
    let json = patch_to_json(patch)?;
    fs::write(path.as_ref(), json)?;
    tracing::info!(path = %path.as_ref().display(), "patch saved");
    Ok(())
}

pub fn load_patch_file(path: impl AsRef<Path>) -> SamplerResult<Patch> {
    let json = fs::read_to_string(path.as_ref())?;
    patch_from_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ids::IdPool,
        patch::{
            modulation::{ModRoute, ModSource, ModTarget},
            slots::{ProcessorConfig, StepLfoConfig},
            Group, KeyRange, PartChannel, Zone, ZoneConfig,
        },
        sample::{SampleManager, SampleStore},
    };

    fn rich_patch(ids: &IdPool) -> Patch {
        let mut patch = Patch::new(ids);
        patch.name = "layers".into();
        patch.part_mut(2).set_channel(PartChannel::Omni);

        for part in [0, 2] {
            for g in 0..2 {
                let group = patch
                    .part_mut(part)
                    .add_group(Group::new(ids.groups.next(), format!("g{g}")));
                for z in 0..3 {
                    let mut config = ZoneConfig::new(
                        None,
                        KeyRange::new(z * 20, z * 20 + 30).with_fades(2, 3).unwrap(),
                        z * 20 + 10,
                    );
                    config.processors[1] = ProcessorConfig::lowpass(800.0 + z as f32, 0.3);
                    config.routing[3] = ModRoute::new(ModSource::Lfo(1), ModTarget::Pitch, 0.5);
                    config.lfos[1] = StepLfoConfig::from_steps(4.0, &[0.0, 1.0, -1.0]);
                    patch
                        .part_mut(part)
                        .group_mut(group)
                        .add_zone(Zone::new(ids.zones.next(), config));
                }
            }
        }
        patch
    }

    #[test]
    fn patch_round_trip_is_structurally_equal() {
        let ids = IdPool::new();
        let patch = rich_patch(&ids);

        let json = patch_to_json(&patch).unwrap();
        let mut restored = patch_from_json(&json).unwrap();
        restored.relink(&SampleStore::new());

        assert!(restored.same_structure(&patch));
        assert_eq!(restored.name, "layers");
        assert_eq!(restored.part(2).channel(), PartChannel::Omni);
        assert_eq!(restored.part(0).group(1).name, "g1");
        assert_eq!(restored.part(2).group(1).zone(2).id(), patch.part(2).group(1).zone(2).id());

        // Serializing the restored tree gives the same document
        assert_eq!(patch_to_json(&restored).unwrap(), json);
    }

    #[test]
    fn other_versions_are_rejected() {
        let ids = IdPool::new();
        let json = patch_to_json(&Patch::new(&ids))
            .unwrap()
            .replacen("\"version\": 1", "\"version\": 7", 1);

        let err = patch_from_json(&json).unwrap_err();
        assert!(matches!(err, SamplerError::UnsupportedVersion { found: 7, expected: 1 }));
    }

    #[test]
    fn state_document_lists_samples() {
        let ids = IdPool::new();
        let store = SampleStore::new();
        store.register(crate::sample::Sample::mono("a", 44_100.0, vec![0.0; 3]));

        let json = state_to_json(&EngineConfig::default(), store.descriptors(), &Patch::new(&ids))
            .unwrap();
        let doc = state_from_json(&json).unwrap();
        assert_eq!(doc.samples.len(), 1);
        assert_eq!(doc.samples[0].frames, 3);
        assert_eq!(doc.config, EngineConfig::default());
    }

    #[test]
    fn patch_files_round_trip() {
        let ids = IdPool::new();
        let patch = rich_patch(&ids);
        let path = std::env::temp_dir().join(format!("saavy_sampler_{}.json", std::process::id()));

        save_patch_file(&path, &patch).unwrap();
        let mut loaded = load_patch_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        loaded.relink(&SampleStore::new());
        assert!(loaded.same_structure(&patch));
    }
}
