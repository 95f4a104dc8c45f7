//! Synthetic configuration descriptors for tests
//!
//! Hand-assembled byte images of typical UAC 1.0 configurations. Kept in
//! the library (not behind cfg(test)) so downstream test suites can feed
//! realistic descriptors to mock devices.

/// Assemble a configuration descriptor around a body of class and
/// interface descriptors, patching wTotalLength
fn config(interfaces: u8, body: &[&[u8]]) -> Vec<u8> {
    let body_len: usize = body.iter().map(|d| d.len()).sum();
    let total = (9 + body_len) as u16;
    let mut out = vec![
        9,
        0x02, // CONFIGURATION
        total as u8,
        (total >> 8) as u8,
        interfaces,
        1,    // bConfigurationValue
        0,    // iConfiguration
        0x80, // bmAttributes
        50,   // bMaxPower
    ];
    for desc in body {
        out.extend_from_slice(desc);
    }
    out
}

fn interface(number: u8, alt: u8, num_eps: u8, class: u8, subclass: u8) -> Vec<u8> {
    vec![9, 0x04, number, alt, num_eps, class, subclass, 0, 0]
}

fn ac_header(bcd_adc: u16, collection: &[u8]) -> Vec<u8> {
    let mut d = vec![
        (8 + collection.len()) as u8,
        0x24,
        0x01,
        bcd_adc as u8,
        (bcd_adc >> 8) as u8,
        0,
        0,
        collection.len() as u8,
    ];
    d.extend_from_slice(collection);
    // wTotalLength of the control block is not checked by the parser
    d
}

fn input_terminal(id: u8, terminal_type: u16, channels: u8) -> Vec<u8> {
    vec![
        12,
        0x24,
        0x02,
        id,
        terminal_type as u8,
        (terminal_type >> 8) as u8,
        0,
        channels,
        0,
        0,
        0,
        0,
    ]
}

fn output_terminal(id: u8, terminal_type: u16, source: u8) -> Vec<u8> {
    vec![
        9,
        0x24,
        0x03,
        id,
        terminal_type as u8,
        (terminal_type >> 8) as u8,
        0,
        source,
        0,
    ]
}

/// Feature unit with bControlSize 1; one entry per channel, master first
fn feature_unit(id: u8, source: u8, controls: &[u8]) -> Vec<u8> {
    let mut d = vec![(7 + controls.len()) as u8, 0x24, 0x06, id, source, 1];
    d.extend_from_slice(controls);
    d.push(0); // iFeature
    d
}

fn selector_unit(id: u8, sources: &[u8]) -> Vec<u8> {
    let mut d = vec![(6 + sources.len()) as u8, 0x24, 0x05, id, sources.len() as u8];
    d.extend_from_slice(sources);
    d.push(0); // iSelector
    d
}

fn as_general(terminal_link: u8, format_tag: u16) -> Vec<u8> {
    vec![
        7,
        0x24,
        0x01,
        terminal_link,
        1,
        format_tag as u8,
        (format_tag >> 8) as u8,
    ]
}

fn format_type_i(channels: u8, subframe: u8, bits: u8, rates: &[u32]) -> Vec<u8> {
    let mut d = vec![
        (8 + 3 * rates.len()) as u8,
        0x24,
        0x02,
        0x01,
        channels,
        subframe,
        bits,
        rates.len() as u8,
    ];
    for rate in rates {
        d.push(*rate as u8);
        d.push((*rate >> 8) as u8);
        d.push((*rate >> 16) as u8);
    }
    d
}

fn iso_endpoint(address: u8, mps: u16, interval: u8) -> Vec<u8> {
    // Audio endpoints carry the 9-byte form with bRefresh/bSynchAddress
    vec![
        9,
        0x05,
        address,
        0x09, // isochronous, adaptive
        mps as u8,
        (mps >> 8) as u8,
        interval,
        0,
        0,
    ]
}

fn cs_endpoint(attributes: u8) -> Vec<u8> {
    vec![7, 0x25, 0x01, attributes, 0, 0, 0]
}

/// Headset: speaker path (interfaces 0 and 1) plus microphone path
/// (interface 2), both with volume and mute on the master channel
pub fn headset_config() -> Vec<u8> {
    headset_config_custom(0x0100, 0x0001, 192)
}

/// Headset image with a chosen bcdADC, for version-rejection tests
pub fn headset_config_with_bcd(bcd_adc: u16) -> Vec<u8> {
    headset_config_custom(bcd_adc, 0x0001, 192)
}

/// Headset image with a chosen wFormatTag on the speaker interface
pub fn headset_config_with_format_tag(tag: u16) -> Vec<u8> {
    headset_config_custom(0x0100, tag, 192)
}

/// Headset image with a chosen speaker endpoint size, for bandwidth tests
pub fn headset_config_with_tx_mps(mps: u16) -> Vec<u8> {
    headset_config_custom(0x0100, 0x0001, mps)
}

fn headset_config_custom(bcd_adc: u16, tx_format_tag: u16, tx_mps: u16) -> Vec<u8> {
    config(
        3,
        &[
            // Audio control interface 0
            &interface(0, 0, 0, 0x01, 0x01),
            &ac_header(bcd_adc, &[1, 2]),
            // Speaker path: USB in -> feature -> speaker out
            &input_terminal(1, 0x0101, 2),
            &feature_unit(2, 1, &[0x03, 0x02, 0x02]),
            &output_terminal(3, 0x0301, 2),
            // Microphone path: mic in -> feature -> USB out
            &input_terminal(4, 0x0201, 1),
            &feature_unit(5, 4, &[0x03, 0x02]),
            &output_terminal(6, 0x0101, 5),
            // Streaming interface 1: speaker (TX)
            &interface(1, 0, 0, 0x01, 0x02),
            &interface(1, 1, 1, 0x01, 0x02),
            &as_general(1, tx_format_tag),
            &format_type_i(2, 2, 16, &[44_100, 48_000]),
            &iso_endpoint(0x01, tx_mps, 1),
            &cs_endpoint(0x01),
            // Streaming interface 2: microphone (RX)
            &interface(2, 0, 0, 0x01, 0x02),
            &interface(2, 1, 1, 0x01, 0x02),
            &as_general(6, 0x0001),
            &format_type_i(1, 2, 16, &[16_000, 48_000]),
            &iso_endpoint(0x82, 96, 1),
            &cs_endpoint(0x01),
        ],
    )
}

/// Microphone whose feature unit hides behind a selector unit
pub fn selector_config() -> Vec<u8> {
    config(
        2,
        &[
            &interface(0, 0, 0, 0x01, 0x01),
            &ac_header(0x0100, &[1]),
            &input_terminal(3, 0x0201, 1),
            &feature_unit(4, 3, &[0x03, 0x02]),
            &selector_unit(5, &[4]),
            &output_terminal(6, 0x0101, 5),
            &interface(1, 0, 0, 0x01, 0x02),
            &interface(1, 1, 1, 0x01, 0x02),
            &as_general(6, 0x0001),
            &format_type_i(1, 2, 16, &[48_000]),
            &iso_endpoint(0x81, 96, 1),
            &cs_endpoint(0x00),
        ],
    )
}

/// A configuration with no audio function at all
pub fn vendor_config() -> Vec<u8> {
    config(
        1,
        &[
            &interface(0, 0, 2, 0xFF, 0x00),
            &[7, 0x05, 0x81, 0x02, 64, 0, 0],
            &[7, 0x05, 0x02, 0x02, 64, 0, 0],
        ],
    )
}
