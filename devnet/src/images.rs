//! Docker images for network components and the versions known to work.

use std::fmt;

use semver::{Version, VersionReq};

use crate::{
    config::{ConsensusLayer, EthereumVersion, ExecutionLayer},
    containers::ContainerRole,
    error::ValidationError,
};

/// Default pre-merge Geth image.
pub const GETH_ETH1_IMAGE: &str = "ethereum/client-go:v1.12.2";
/// Default merged Geth image.
pub const GETH_ETH2_IMAGE: &str = "ethereum/client-go:v1.14.3";
/// Default pre-merge Besu image.
pub const BESU_ETH1_IMAGE: &str = "hyperledger/besu:23.10.3";
/// Default merged Besu image.
pub const BESU_ETH2_IMAGE: &str = "hyperledger/besu:24.5.1";
/// Default pre-merge Erigon image.
pub const ERIGON_ETH1_IMAGE: &str = "thorax/erigon:v2.40.0";
/// Default merged Erigon image.
pub const ERIGON_ETH2_IMAGE: &str = "thorax/erigon:v2.59.3";
/// Default pre-merge Nethermind image.
pub const NETHERMIND_ETH1_IMAGE: &str = "nethermind/nethermind:1.25.4";
/// Default merged Nethermind image.
pub const NETHERMIND_ETH2_IMAGE: &str = "nethermind/nethermind:1.26.0";
/// Default Reth image.
pub const RETH_IMAGE: &str = "ghcr.io/paradigmxyz/reth:v1.10.2";

/// Default Prysm beacon node image.
pub const PRYSM_BEACON_IMAGE: &str = "gcr.io/prysmaticlabs/prysm/beacon-chain:v5.0.4";
/// Default Prysm validator image.
pub const PRYSM_VALIDATOR_IMAGE: &str = "gcr.io/prysmaticlabs/prysm/validator:v5.0.4";
/// Default Lighthouse image, used for both beacon and validator.
pub const LIGHTHOUSE_IMAGE: &str = "sigp/lighthouse:v5.3.0";

/// Default genesis generator image.
pub const GENESIS_GENERATOR_IMAGE: &str = "ethpandaops/ethereum-genesis-generator:3.3.5";
/// Default validator key tooling image, also used by the after-genesis helper.
pub const VAL_TOOLS_IMAGE: &str = "protolambda/eth2-val-tools:latest";

/// Execution client versions known to work, per chain version.
const EXECUTION_COMPATIBILITY: &[(ExecutionLayer, EthereumVersion, &str)] = &[
    (ExecutionLayer::Geth, EthereumVersion::Eth1, ">=1.10.0, <1.14.0"),
    (ExecutionLayer::Geth, EthereumVersion::Eth2, ">=1.13.0"),
    (ExecutionLayer::Besu, EthereumVersion::Eth1, ">=21.1.0, <24.1.0"),
    (ExecutionLayer::Besu, EthereumVersion::Eth2, ">=23.1.0"),
    (ExecutionLayer::Erigon, EthereumVersion::Eth1, ">=2.40.0, <2.60.0"),
    (ExecutionLayer::Erigon, EthereumVersion::Eth2, ">=2.47.0"),
    (ExecutionLayer::Nethermind, EthereumVersion::Eth1, ">=1.16.0, <1.26.0"),
    (ExecutionLayer::Nethermind, EthereumVersion::Eth2, ">=1.21.0"),
    (ExecutionLayer::Reth, EthereumVersion::Eth2, ">=1.0.0"),
];

/// Consensus client versions known to work.
const CONSENSUS_COMPATIBILITY: &[(ConsensusLayer, &str)] =
    &[(ConsensusLayer::Prysm, ">=4.0.0"), (ConsensusLayer::Lighthouse, ">=4.5.0")];

/// Returns the default execution client image.
pub const fn default_execution_image(layer: ExecutionLayer, version: EthereumVersion) -> &'static str {
    match (layer, version) {
        (ExecutionLayer::Geth, EthereumVersion::Eth1) => GETH_ETH1_IMAGE,
        (ExecutionLayer::Geth, EthereumVersion::Eth2) => GETH_ETH2_IMAGE,
        (ExecutionLayer::Besu, EthereumVersion::Eth1) => BESU_ETH1_IMAGE,
        (ExecutionLayer::Besu, EthereumVersion::Eth2) => BESU_ETH2_IMAGE,
        (ExecutionLayer::Erigon, EthereumVersion::Eth1) => ERIGON_ETH1_IMAGE,
        (ExecutionLayer::Erigon, EthereumVersion::Eth2) => ERIGON_ETH2_IMAGE,
        (ExecutionLayer::Nethermind, EthereumVersion::Eth1) => NETHERMIND_ETH1_IMAGE,
        (ExecutionLayer::Nethermind, EthereumVersion::Eth2) => NETHERMIND_ETH2_IMAGE,
        (ExecutionLayer::Reth, _) => RETH_IMAGE,
    }
}

/// Returns the default beacon node and validator images.
pub const fn default_consensus_images(layer: ConsensusLayer) -> (&'static str, &'static str) {
    match layer {
        ConsensusLayer::Prysm => (PRYSM_BEACON_IMAGE, PRYSM_VALIDATOR_IMAGE),
        ConsensusLayer::Lighthouse => (LIGHTHOUSE_IMAGE, LIGHTHOUSE_IMAGE),
    }
}

/// A `name:tag` docker image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Repository, including registry if any.
    pub name: String,
    /// Tag.
    pub tag: String,
}

impl ImageRef {
    /// Splits `image` into name and tag. The tag is mandatory.
    pub fn parse(image: &str) -> Result<Self, ValidationError> {
        let malformed = |reason: &str| ValidationError::MalformedImage {
            image: image.to_string(),
            reason: reason.to_string(),
        };
        let (name, tag) = image.rsplit_once(':').ok_or_else(|| malformed("image tag is missing"))?;
        if tag.is_empty() || tag.contains('/') {
            return Err(malformed("image tag is missing"));
        }
        if name.is_empty() {
            return Err(malformed("image name is missing"));
        }
        Ok(Self { name: name.to_string(), tag: tag.to_string() })
    }

    /// Last path segment of the repository name.
    pub fn repository(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Parses the tag as a version, accepting a `v` prefix, a missing patch
    /// component and a trailing `-suffix`.
    pub fn version(&self) -> Result<Version, ValidationError> {
        let malformed = || ValidationError::MalformedImage {
            image: self.to_string(),
            reason: format!("tag {} is not a semantic version", self.tag),
        };
        let core = self.tag.trim_start_matches('v');
        let core = core.split(['-', '+']).next().unwrap_or(core);
        let parts = core
            .split('.')
            .map(|part| part.parse::<u64>().map_err(|_| malformed()))
            .collect::<Result<Vec<_>, _>>()?;
        match parts.as_slice() {
            [major, minor] => Ok(Version::new(*major, *minor, 0)),
            [major, minor, patch] => Ok(Version::new(*major, *minor, *patch)),
            _ => Err(malformed()),
        }
    }

    /// Infers the execution client from the repository name.
    pub fn execution_layer(&self) -> Option<ExecutionLayer> {
        let repository = self.repository().to_ascii_lowercase();
        if repository == "client-go" || repository.contains("geth") {
            return Some(ExecutionLayer::Geth);
        }
        ExecutionLayer::ALL
            .into_iter()
            .filter(|layer| *layer != ExecutionLayer::Geth)
            .find(|layer| repository.contains(layer.as_str()))
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

fn requirement(req: &str) -> VersionReq {
    VersionReq::parse(req).unwrap_or(VersionReq::STAR)
}

fn unsupported(image: &ImageRef, reason: String) -> ValidationError {
    ValidationError::UnsupportedImage { image: image.to_string(), reason }
}

/// Returns the chain version the execution image is best suited for.
///
/// Merged is preferred when the version supports both.
pub fn infer_ethereum_version(image: &str) -> Result<EthereumVersion, ValidationError> {
    let image = ImageRef::parse(image)?;
    let layer = image
        .execution_layer()
        .ok_or_else(|| unsupported(&image, "unknown execution client".into()))?;
    let version = image.version()?;
    [EthereumVersion::Eth2, EthereumVersion::Eth1]
        .into_iter()
        .find(|eth| {
            EXECUTION_COMPATIBILITY
                .iter()
                .any(|(l, e, req)| *l == layer && e == eth && requirement(req).matches(&version))
        })
        .ok_or_else(|| unsupported(&image, format!("{layer} {version} is not a supported version")))
}

/// Checks an execution client image against the compatibility table.
pub fn check_execution_image(
    image: &str,
    layer: ExecutionLayer,
    eth: EthereumVersion,
) -> Result<(), ValidationError> {
    let image = ImageRef::parse(image)?;
    match image.execution_layer() {
        Some(inferred) if inferred != layer => {
            return Err(ValidationError::MismatchedExecutionImage {
                image_layer: inferred.to_string(),
                requested: layer.to_string(),
            });
        }
        Some(_) => {}
        None => return Err(unsupported(&image, "unknown execution client".into())),
    }
    let version = image.version()?;
    let req = EXECUTION_COMPATIBILITY
        .iter()
        .find(|(l, e, _)| *l == layer && *e == eth)
        .map(|(_, _, req)| requirement(req))
        .ok_or_else(|| unsupported(&image, format!("{layer} does not support {eth}")))?;
    if !req.matches(&version) {
        return Err(unsupported(&image, format!("{layer} {eth} requires version {req}")));
    }
    Ok(())
}

/// Checks a beacon node or validator image against the compatibility table.
pub fn check_consensus_image(image: &str, layer: ConsensusLayer) -> Result<(), ValidationError> {
    let image = ImageRef::parse(image)?;
    let version = image.version()?;
    let req = CONSENSUS_COMPATIBILITY
        .iter()
        .find(|(l, _)| *l == layer)
        .map(|(_, req)| requirement(req))
        .unwrap_or(VersionReq::STAR);
    if !req.matches(&version) {
        return Err(unsupported(&image, format!("{layer} requires version {req}")));
    }
    Ok(())
}

/// Checks a custom image override for `role`.
///
/// Setup images only need to be well formed.
pub fn check_custom_image(
    role: ContainerRole,
    image: &str,
    execution: ExecutionLayer,
    eth: EthereumVersion,
    consensus: Option<ConsensusLayer>,
) -> Result<(), ValidationError> {
    match role {
        ContainerRole::ExecutionLayer => check_execution_image(image, execution, eth),
        ContainerRole::ConsensusLayer | ContainerRole::ConsensusValidator => match consensus {
            Some(layer) => check_consensus_image(image, layer),
            None => Err(ValidationError::UnexpectedConsensusLayer(format!("custom {role} image"))),
        },
        _ => ImageRef::parse(image).map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::plain("nethermind/nethermind:1.26.0", "nethermind/nethermind", "1.26.0")]
    #[case::registry_port("localhost:5000/reth:v1.1.0", "localhost:5000/reth", "v1.1.0")]
    fn test_parse_image(#[case] image: &str, #[case] name: &str, #[case] tag: &str) {
        let parsed = ImageRef::parse(image).unwrap();
        assert_eq!(parsed.name, name);
        assert_eq!(parsed.tag, tag);
    }

    #[rstest]
    #[case::no_tag("ethereum/client-go")]
    #[case::registry_without_tag("localhost:5000/geth")]
    #[case::empty_tag("ethereum/client-go:")]
    fn test_malformed_image(#[case] image: &str) {
        assert!(matches!(ImageRef::parse(image), Err(ValidationError::MalformedImage { .. })));
    }

    #[rstest]
    #[case::v_prefix("v1.13.5", Version::new(1, 13, 5))]
    #[case::two_parts("1.26", Version::new(1, 26, 0))]
    #[case::suffix("v2.59.3-amd64", Version::new(2, 59, 3))]
    fn test_tag_versions(#[case] tag: &str, #[case] expected: Version) {
        let image = ImageRef { name: "x".into(), tag: tag.into() };
        assert_eq!(image.version().unwrap(), expected);
    }

    #[test]
    fn test_latest_is_not_a_version() {
        let image = ImageRef::parse("ethereum/client-go:latest").unwrap();
        assert!(matches!(image.version(), Err(ValidationError::MalformedImage { .. })));
    }

    #[rstest]
    #[case::geth("ethereum/client-go:v1.14.0", ExecutionLayer::Geth)]
    #[case::besu("hyperledger/besu:24.1.0", ExecutionLayer::Besu)]
    #[case::erigon("thorax/erigon:v2.59.0", ExecutionLayer::Erigon)]
    #[case::nethermind("nethermind/nethermind:1.26.0", ExecutionLayer::Nethermind)]
    #[case::reth("ghcr.io/paradigmxyz/reth:v1.10.2", ExecutionLayer::Reth)]
    fn test_execution_layer_inference(#[case] image: &str, #[case] expected: ExecutionLayer) {
        assert_eq!(ImageRef::parse(image).unwrap().execution_layer(), Some(expected));
    }

    #[rstest]
    #[case::old_geth("ethereum/client-go:v1.12.2", EthereumVersion::Eth1)]
    #[case::new_geth("ethereum/client-go:v1.14.0", EthereumVersion::Eth2)]
    #[case::reth("ghcr.io/paradigmxyz/reth:v1.0.0", EthereumVersion::Eth2)]
    fn test_version_inference(#[case] image: &str, #[case] expected: EthereumVersion) {
        assert_eq!(infer_ethereum_version(image).unwrap(), expected);
    }

    #[test]
    fn test_defaults_pass_the_compatibility_table() {
        for layer in ExecutionLayer::ALL {
            check_execution_image(default_execution_image(layer, EthereumVersion::Eth2), layer, EthereumVersion::Eth2)
                .unwrap();
            if layer != ExecutionLayer::Reth {
                check_execution_image(default_execution_image(layer, EthereumVersion::Eth1), layer, EthereumVersion::Eth1)
                    .unwrap();
            }
        }
        for layer in [ConsensusLayer::Prysm, ConsensusLayer::Lighthouse] {
            let (beacon, validator) = default_consensus_images(layer);
            check_consensus_image(beacon, layer).unwrap();
            check_consensus_image(validator, layer).unwrap();
        }
    }

    #[test]
    fn test_too_old_image_is_rejected() {
        let err = check_execution_image("ethereum/client-go:v1.9.0", ExecutionLayer::Geth, EthereumVersion::Eth2)
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedImage { .. }));
    }

    #[test]
    fn test_mismatched_client_is_rejected() {
        let err = check_execution_image("hyperledger/besu:24.1.0", ExecutionLayer::Geth, EthereumVersion::Eth2)
            .unwrap_err();
        assert!(matches!(err, ValidationError::MismatchedExecutionImage { .. }));
    }

    #[test]
    fn test_setup_images_only_need_a_tag() {
        let check = |image| {
            check_custom_image(
                ContainerRole::GenesisGenerator,
                image,
                ExecutionLayer::Geth,
                EthereumVersion::Eth2,
                Some(ConsensusLayer::Prysm),
            )
        };
        assert!(check("my/genesis:dev").is_ok());
        assert!(check("my/genesis").is_err());
    }
}
