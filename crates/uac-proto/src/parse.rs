//! Configuration descriptor parsing
//!
//! Two passes over the raw configuration buffer: one over the first
//! audio-control interface to build the unit/terminal topology, and one
//! over a chosen audio-streaming interface to collect its alternate
//! settings. Both are pure functions of the input bytes.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::consts::{
    BCD_ADC_V1_0, ENDPOINT_DIR_IN, ac_subtype, as_subtype, class, desc_type, ep_subtype, format,
    terminal_type,
};
use crate::descriptor::{
    AcHeaderDesc, AsGeneralDesc, CsEndpointDesc, DescriptorCursor, EndpointDesc, FeatureUnitDesc,
    FormatTypeIDesc, InputTerminalDesc, InterfaceDesc, OutputTerminalDesc, UnitSourcesDesc,
    config_bounds,
};
use crate::error::{ParseError, Result};
use crate::types::{AltSetting, FeatureUnitInfo, StreamDirection};

/// One entity of the audio-control topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcEntity {
    InputTerminal {
        id: u8,
        terminal_type: u16,
        channels: u8,
    },
    OutputTerminal {
        id: u8,
        terminal_type: u16,
        source: u8,
    },
    FeatureUnit {
        id: u8,
        source: u8,
        info: FeatureUnitInfo,
    },
    /// Mixer and selector units both reduce to id plus input pins here
    PassThroughUnit {
        id: u8,
        sources: Vec<u8>,
    },
}

impl AcEntity {
    fn id(&self) -> u8 {
        match self {
            AcEntity::InputTerminal { id, .. }
            | AcEntity::OutputTerminal { id, .. }
            | AcEntity::FeatureUnit { id, .. }
            | AcEntity::PassThroughUnit { id, .. } => *id,
        }
    }

    fn sources(&self) -> &[u8] {
        match self {
            AcEntity::InputTerminal { .. } => &[],
            AcEntity::OutputTerminal { source, .. } | AcEntity::FeatureUnit { source, .. } => {
                std::slice::from_ref(source)
            }
            AcEntity::PassThroughUnit { sources, .. } => sources,
        }
    }
}

/// Parsed audio-control interface: the unit/terminal topology of the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcInterfaceInfo {
    /// Interface number of the audio-control interface
    pub interface: u8,
    /// Every terminal and unit the control block declares, in order
    pub entities: Vec<AcEntity>,
}

impl AcInterfaceInfo {
    fn entity_by_id(&self, id: u8) -> Option<&AcEntity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    fn entity_sourced_from(&self, id: u8) -> Option<&AcEntity> {
        self.entities.iter().find(|e| e.sources().contains(&id))
    }

    /// Classify a stream by its terminal link: a USB-streaming input
    /// terminal feeds audio into the device (host transmits), a
    /// USB-streaming output terminal feeds the host (host receives)
    pub fn direction_of(&self, terminal_link: u8) -> Option<StreamDirection> {
        match self.entity_by_id(terminal_link)? {
            AcEntity::InputTerminal { terminal_type, .. }
                if *terminal_type == terminal_type::USB_STREAMING =>
            {
                Some(StreamDirection::Tx)
            }
            AcEntity::OutputTerminal { terminal_type, .. }
                if *terminal_type == terminal_type::USB_STREAMING =>
            {
                Some(StreamDirection::Rx)
            }
            _ => None,
        }
    }

    /// Resolve the feature unit governing a stream.
    ///
    /// For a transmit stream the walk follows the audio forward from the
    /// USB-streaming input terminal (matching each hop by source id); for a
    /// receive stream it follows source links backward from the
    /// USB-streaming output terminal. Mixer and selector units are passed
    /// through; the walk stops at the first feature unit or at a chain end.
    pub fn feature_unit_for(
        &self,
        terminal_link: u8,
        direction: StreamDirection,
    ) -> Option<FeatureUnitInfo> {
        // Hop budget: a well-formed topology never revisits an entity
        let mut budget = self.entities.len() + 1;
        match direction {
            StreamDirection::Tx => {
                let mut current = terminal_link;
                while budget > 0 {
                    budget -= 1;
                    match self.entity_sourced_from(current)? {
                        AcEntity::FeatureUnit { info, .. } => return Some(*info),
                        AcEntity::PassThroughUnit { id, .. } => current = *id,
                        AcEntity::OutputTerminal { .. } | AcEntity::InputTerminal { .. } => {
                            return None;
                        }
                    }
                }
                None
            }
            StreamDirection::Rx => {
                let start = match self.entity_by_id(terminal_link)? {
                    AcEntity::OutputTerminal { source, .. } => *source,
                    _ => return None,
                };
                let mut current = start;
                while budget > 0 {
                    budget -= 1;
                    match self.entity_by_id(current)? {
                        AcEntity::FeatureUnit { info, .. } => return Some(*info),
                        AcEntity::PassThroughUnit { sources, .. } => {
                            current = *sources.first()?;
                        }
                        AcEntity::InputTerminal { .. } | AcEntity::OutputTerminal { .. } => {
                            return None;
                        }
                    }
                }
                None
            }
        }
    }
}

/// Parsed audio-streaming interface with all of its alternate settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInterfaceInfo {
    pub interface: u8,
    pub direction: StreamDirection,
    /// Index `i` corresponds to wire alternate setting `i + 1`
    pub alt_settings: Vec<AltSetting>,
}

/// Whether this configuration carries at least one UAC 1.0 audio function
pub fn has_audio_interface(config: &[u8]) -> bool {
    let Ok(bytes) = config_bounds(config) else {
        return false;
    };
    let mut cursor = DescriptorCursor::new(bytes);
    while let Ok(Some(raw)) = cursor.next() {
        if raw.descriptor_type() != desc_type::INTERFACE {
            continue;
        }
        if let Ok(iface) = InterfaceDesc::parse(&raw)
            && iface.class == class::AUDIO
            && iface.subclass == class::SUBCLASS_AUDIOCONTROL
        {
            return true;
        }
    }
    false
}

/// Every audio-streaming interface in this configuration and its direction,
/// one entry per interface number regardless of alternate setting count
pub fn streaming_interfaces(config: &[u8]) -> Result<Vec<(u8, StreamDirection)>> {
    let bytes = config_bounds(config)?;
    let mut cursor = DescriptorCursor::new(bytes);
    let mut found: Vec<(u8, StreamDirection)> = Vec::new();
    let mut in_streaming: Option<u8> = None;
    while let Some(raw) = cursor.next()? {
        match raw.descriptor_type() {
            desc_type::INTERFACE => {
                let iface = InterfaceDesc::parse(&raw)?;
                in_streaming = (iface.class == class::AUDIO
                    && iface.subclass == class::SUBCLASS_AUDIOSTREAMING
                    && iface.num_endpoints > 0)
                    .then_some(iface.number);
            }
            desc_type::ENDPOINT => {
                if let Some(number) = in_streaming.take() {
                    if found.iter().any(|(n, _)| *n == number) {
                        continue;
                    }
                    let ep = EndpointDesc::parse(&raw)?;
                    let direction = if ep.address & ENDPOINT_DIR_IN != 0 {
                        StreamDirection::Rx
                    } else {
                        StreamDirection::Tx
                    };
                    found.push((number, direction));
                }
            }
            _ => {}
        }
    }
    Ok(found)
}

/// Parse the first audio-control interface of a configuration.
///
/// Only the first control interface is considered; composite devices with
/// several audio functions expose the first one.
pub fn parse_ac_interface(config: &[u8]) -> Result<AcInterfaceInfo> {
    let bytes = config_bounds(config)?;
    let mut cursor = DescriptorCursor::new(bytes);
    let mut interface: Option<u8> = None;
    let mut entities = Vec::new();
    while let Some(raw) = cursor.next()? {
        match raw.descriptor_type() {
            desc_type::INTERFACE => {
                let iface = InterfaceDesc::parse(&raw)?;
                if interface.is_some() {
                    // Control block ended at the next interface
                    break;
                }
                if iface.class == class::AUDIO && iface.subclass == class::SUBCLASS_AUDIOCONTROL {
                    debug!(interface = iface.number, "found audio control interface");
                    interface = Some(iface.number);
                }
            }
            desc_type::CS_INTERFACE if interface.is_some() => match raw.subtype() {
                ac_subtype::HEADER => {
                    let header = AcHeaderDesc::parse(&raw)?;
                    if header.bcd_adc != BCD_ADC_V1_0 {
                        warn!(bcd_adc = header.bcd_adc, "unsupported audio class version");
                        return Err(ParseError::UnsupportedVersion {
                            bcd_adc: header.bcd_adc,
                        });
                    }
                }
                ac_subtype::INPUT_TERMINAL => {
                    let it = InputTerminalDesc::parse(&raw)?;
                    trace!(id = it.terminal_id, terminal_type = it.terminal_type, "input terminal");
                    entities.push(AcEntity::InputTerminal {
                        id: it.terminal_id,
                        terminal_type: it.terminal_type,
                        channels: it.nr_channels,
                    });
                }
                ac_subtype::OUTPUT_TERMINAL => {
                    let ot = OutputTerminalDesc::parse(&raw)?;
                    trace!(id = ot.terminal_id, terminal_type = ot.terminal_type, "output terminal");
                    entities.push(AcEntity::OutputTerminal {
                        id: ot.terminal_id,
                        terminal_type: ot.terminal_type,
                        source: ot.source_id,
                    });
                }
                ac_subtype::FEATURE_UNIT => {
                    let fu = FeatureUnitDesc::parse(&raw)?;
                    trace!(
                        id = fu.unit_id,
                        volume_channels = fu.volume_channels,
                        mute_channels = fu.mute_channels,
                        "feature unit"
                    );
                    entities.push(AcEntity::FeatureUnit {
                        id: fu.unit_id,
                        source: fu.source_id,
                        info: FeatureUnitInfo {
                            unit_id: fu.unit_id,
                            volume_channels: fu.volume_channels,
                            mute_channels: fu.mute_channels,
                        },
                    });
                }
                ac_subtype::MIXER_UNIT | ac_subtype::SELECTOR_UNIT => {
                    let unit = UnitSourcesDesc::parse(&raw)?;
                    entities.push(AcEntity::PassThroughUnit {
                        id: unit.unit_id,
                        sources: unit.sources,
                    });
                }
                other => {
                    trace!(subtype = other, "skipping audio control descriptor");
                }
            },
            _ => {}
        }
    }
    let interface = interface.ok_or(ParseError::NoAudioControl)?;
    Ok(AcInterfaceInfo {
        interface,
        entities,
    })
}

/// Accumulator for one alternate setting under construction
#[derive(Default)]
struct AltBuilder {
    general: Option<AsGeneralDesc>,
    format: Option<FormatTypeIDesc>,
    endpoint: Option<EndpointDesc>,
}

impl AltBuilder {
    fn finish(self, freq_ctrl_supported: bool) -> Result<Option<AltSetting>> {
        let (Some(general), Some(format), Some(endpoint)) =
            (self.general, self.format, self.endpoint)
        else {
            // Incomplete alternate settings are skipped, not fatal
            return Ok(None);
        };
        if general.format_tag != format::TAG_PCM {
            return Err(ParseError::UnsupportedFormatTag {
                tag: general.format_tag,
            });
        }
        if format.format_type != format::TYPE_I {
            return Err(ParseError::UnsupportedFormatType {
                format_type: format.format_type,
            });
        }
        Ok(Some(AltSetting {
            terminal_link: general.terminal_link,
            channels: format.nr_channels,
            subframe_size: format.subframe_size,
            bit_resolution: format.bit_resolution,
            sample_rates: format.sample_rates,
            endpoint_address: endpoint.address,
            endpoint_mps: endpoint.max_packet_size,
            endpoint_attributes: endpoint.attributes,
            endpoint_interval: endpoint.interval,
            freq_ctrl_supported,
        }))
    }
}

/// Parse one audio-streaming interface into its alternate settings.
///
/// Alternate setting 0 (zero bandwidth) contributes nothing; every data-
/// bearing alternate setting must carry an AS general descriptor, a Type I
/// format descriptor and an isochronous endpoint. The stream direction
/// comes from the terminal topology when the control block resolves the
/// terminal link, otherwise from the endpoint direction bit.
pub fn parse_streaming_interface(config: &[u8], interface: u8) -> Result<StreamInterfaceInfo> {
    let bytes = config_bounds(config)?;
    let ac = parse_ac_interface(config)?;
    let mut cursor = DescriptorCursor::new(bytes);
    let mut alt_settings = Vec::new();
    let mut seen_interface = false;
    let mut builder: Option<AltBuilder> = None;
    let mut pending_cs_ep = false;

    while let Some(raw) = cursor.next()? {
        match raw.descriptor_type() {
            desc_type::INTERFACE => {
                let iface = InterfaceDesc::parse(&raw)?;
                if let Some(b) = builder.take()
                    && let Some(alt) = b.finish(false)?
                {
                    alt_settings.push(alt);
                }
                pending_cs_ep = false;
                if iface.number != interface {
                    if seen_interface {
                        break;
                    }
                    continue;
                }
                if iface.class != class::AUDIO || iface.subclass != class::SUBCLASS_AUDIOSTREAMING
                {
                    return Err(ParseError::NoSuchInterface { interface });
                }
                seen_interface = true;
                if iface.num_endpoints > 0 {
                    builder = Some(AltBuilder::default());
                }
            }
            desc_type::CS_INTERFACE => {
                if let Some(b) = builder.as_mut() {
                    match raw.subtype() {
                        as_subtype::GENERAL => b.general = Some(AsGeneralDesc::parse(&raw)?),
                        as_subtype::FORMAT_TYPE => b.format = Some(FormatTypeIDesc::parse(&raw)?),
                        _ => {}
                    }
                }
            }
            desc_type::ENDPOINT => {
                if let Some(b) = builder.as_mut() {
                    let ep = EndpointDesc::parse(&raw)?;
                    // First endpoint is the data endpoint; a second one
                    // would be the feedback endpoint, which is ignored
                    if b.endpoint.is_none() {
                        b.endpoint = Some(ep);
                        pending_cs_ep = true;
                    }
                }
            }
            desc_type::CS_ENDPOINT => {
                if pending_cs_ep
                    && raw.subtype() == ep_subtype::GENERAL
                    && let Some(b) = builder.take()
                {
                    pending_cs_ep = false;
                    let cs = CsEndpointDesc::parse(&raw)?;
                    if let Some(alt) = b.finish(cs.sampling_freq_control())? {
                        alt_settings.push(alt);
                    }
                }
            }
            _ => {}
        }
    }
    if let Some(b) = builder.take()
        && let Some(alt) = b.finish(false)?
    {
        alt_settings.push(alt);
    }

    if !seen_interface {
        return Err(ParseError::NoSuchInterface { interface });
    }
    if alt_settings.is_empty() {
        return Err(ParseError::NoAltSettings { interface });
    }

    let direction = ac
        .direction_of(alt_settings[0].terminal_link)
        .unwrap_or_else(|| {
            if alt_settings[0].endpoint_address & ENDPOINT_DIR_IN != 0 {
                StreamDirection::Rx
            } else {
                StreamDirection::Tx
            }
        });
    debug!(
        interface,
        ?direction,
        alt_settings = alt_settings.len(),
        "parsed streaming interface"
    );
    Ok(StreamInterfaceInfo {
        interface,
        direction,
        alt_settings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata;

    #[test]
    fn test_headset_has_audio_interface() {
        assert!(has_audio_interface(&testdata::headset_config()));
        assert!(!has_audio_interface(&testdata::vendor_config()));
    }

    #[test]
    fn test_streaming_interfaces_listed_with_direction() {
        let config = testdata::headset_config();
        let streams = streaming_interfaces(&config).unwrap();
        assert_eq!(
            streams,
            vec![(1, StreamDirection::Tx), (2, StreamDirection::Rx)]
        );
    }

    #[test]
    fn test_ac_topology_parsed() {
        let config = testdata::headset_config();
        let ac = parse_ac_interface(&config).unwrap();
        assert_eq!(ac.interface, 0);
        // 2 input terminals, 2 output terminals, 2 feature units
        assert_eq!(ac.entities.len(), 6);
        assert_eq!(ac.direction_of(1), Some(StreamDirection::Tx));
        assert_eq!(ac.direction_of(6), Some(StreamDirection::Rx));
    }

    #[test]
    fn test_feature_unit_resolved_both_directions() {
        let config = testdata::headset_config();
        let ac = parse_ac_interface(&config).unwrap();

        let tx_fu = ac.feature_unit_for(1, StreamDirection::Tx).unwrap();
        assert_eq!(tx_fu.unit_id, 2);
        assert!(tx_fu.has_volume());
        assert!(tx_fu.has_mute());

        let rx_fu = ac.feature_unit_for(6, StreamDirection::Rx).unwrap();
        assert_eq!(rx_fu.unit_id, 5);
    }

    #[test]
    fn test_feature_unit_resolved_through_selector() {
        let config = testdata::selector_config();
        let ac = parse_ac_interface(&config).unwrap();
        // Rx path: output terminal 6 <- selector 5 <- feature 4 <- input 3
        let fu = ac.feature_unit_for(6, StreamDirection::Rx).unwrap();
        assert_eq!(fu.unit_id, 4);
    }

    #[test]
    fn test_undersized_descriptor_rejected() {
        // A one-byte descriptor wedged in after the configuration header
        // must fail the walk instead of yielding an unreadable descriptor
        let mut config = testdata::headset_config();
        config.insert(9, 1);
        let total = config.len() as u16;
        config[2..4].copy_from_slice(&total.to_le_bytes());
        assert_eq!(
            parse_ac_interface(&config).unwrap_err(),
            ParseError::Truncated { offset: 9 }
        );
    }

    #[test]
    fn test_unsupported_class_version_rejected() {
        let config = testdata::headset_config_with_bcd(0x0200);
        assert_eq!(
            parse_ac_interface(&config).unwrap_err(),
            ParseError::UnsupportedVersion { bcd_adc: 0x0200 }
        );
    }

    #[test]
    fn test_tx_interface_alt_settings() {
        let config = testdata::headset_config();
        let info = parse_streaming_interface(&config, 1).unwrap();
        assert_eq!(info.direction, StreamDirection::Tx);
        assert_eq!(info.alt_settings.len(), 1);
        let alt = &info.alt_settings[0];
        assert_eq!(alt.channels, 2);
        assert_eq!(alt.bit_resolution, 16);
        assert_eq!(alt.endpoint_address, 0x01);
        assert!(alt.freq_ctrl_supported);
        assert!(alt.sample_rates.supports(48_000));
    }

    #[test]
    fn test_missing_interface_rejected() {
        let config = testdata::headset_config();
        assert_eq!(
            parse_streaming_interface(&config, 7).unwrap_err(),
            ParseError::NoSuchInterface { interface: 7 }
        );
    }

    #[test]
    fn test_non_pcm_format_rejected() {
        let config = testdata::headset_config_with_format_tag(0x0003);
        assert_eq!(
            parse_streaming_interface(&config, 1).unwrap_err(),
            ParseError::UnsupportedFormatTag { tag: 0x0003 }
        );
    }

    #[test]
    fn test_parse_is_deterministic() {
        let config = testdata::headset_config();
        let a = parse_streaming_interface(&config, 2).unwrap();
        let b = parse_streaming_interface(&config, 2).unwrap();
        assert_eq!(a, b);
    }
}
