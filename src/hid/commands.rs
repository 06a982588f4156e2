//! Output report builders
//!
//! Every builder takes the current rumble flag: the remote reads bit 0 of the
//! second byte of *every* output report as the rumble motor state, so a command
//! built without it would switch a running motor off.

use super::protocol::{
    output, register, DataReportMode, IrMode, LedPattern, ADDRESS_SPACE_REGISTER, FLAG_ENABLE,
    IR_SENSITIVITY_BLOCK_1, IR_SENSITIVITY_BLOCK_2, MAX_REGISTER_DATA, WRITE_REGISTER_SIZE,
};

fn rumble_bit(rumble: bool) -> u8 {
    u8::from(rumble)
}

/// Build a rumble on/off report
pub fn build_rumble(rumble: bool) -> Vec<u8> {
    vec![output::RUMBLE, rumble_bit(rumble)]
}

/// Build a player LED report
pub fn build_player_leds(leds: LedPattern, rumble: bool) -> Vec<u8> {
    vec![output::PLAYER_LEDS, (leds.to_nibble() << 4) | rumble_bit(rumble)]
}

/// Build a data reporting mode report (non-continuous: the remote reports on change)
pub fn build_report_mode(mode: DataReportMode, rumble: bool) -> Vec<u8> {
    vec![output::DATA_REPORT_MODE, rumble_bit(rumble), mode.as_byte()]
}

/// Build a status information request
pub fn build_status_request(rumble: bool) -> Vec<u8> {
    vec![output::STATUS_REQUEST, rumble_bit(rumble)]
}

/// Build a control register write. Data longer than 16 bytes is truncated.
pub fn build_write_register(address: u32, data: &[u8], rumble: bool) -> Vec<u8> {
    let len = data.len().min(MAX_REGISTER_DATA);
    let mut report = vec![0u8; WRITE_REGISTER_SIZE];
    report[0] = output::WRITE_MEMORY;
    report[1] = ADDRESS_SPACE_REGISTER | rumble_bit(rumble);
    report[2..5].copy_from_slice(&address.to_be_bytes()[1..]);
    report[5] = len as u8;
    report[6..6 + len].copy_from_slice(&data[..len]);
    report
}

/// Build a memory read request. `register` selects control registers over EEPROM.
pub fn build_read_memory(address: u32, size: u16, register: bool, rumble: bool) -> Vec<u8> {
    let space = if register { ADDRESS_SPACE_REGISTER } else { 0x00 };
    let mut report = vec![output::READ_MEMORY, space | rumble_bit(rumble)];
    report.extend_from_slice(&address.to_be_bytes()[1..]);
    report.extend_from_slice(&size.to_be_bytes());
    report
}

/// Build the reports that unlock and identify an attached extension
///
/// Writing `0x55` then `0x00` disables extension encryption; the 6-byte id
/// is then read back from `0xA400FA`.
pub fn build_extension_identify(rumble: bool) -> Vec<Vec<u8>> {
    vec![
        build_write_register(register::EXTENSION_INIT_1, &[0x55], rumble),
        build_write_register(register::EXTENSION_INIT_2, &[0x00], rumble),
        build_read_memory(register::EXTENSION_ID, register::EXTENSION_ID_LEN, true, rumble),
    ]
}

/// Build the extension id read alone, for when the port is already unlocked
pub fn build_extension_id_read(rumble: bool) -> Vec<u8> {
    build_read_memory(register::EXTENSION_ID, register::EXTENSION_ID_LEN, true, rumble)
}

/// Build a read of the inactive MotionPlus id at `0xA600FA`
///
/// The read fails with an error code when no MotionPlus is plugged in, or
/// when one is already active.
pub fn build_motion_plus_id_read(rumble: bool) -> Vec<u8> {
    build_read_memory(register::MOTION_PLUS_ID, register::EXTENSION_ID_LEN, true, rumble)
}

/// Build the MotionPlus activation writes
///
/// Once active the MotionPlus takes over the extension registers and
/// identifies at `0xA400FA`.
pub fn build_motion_plus_activate(rumble: bool) -> Vec<Vec<u8>> {
    vec![
        build_write_register(register::MOTION_PLUS_INIT, &[0x55], rumble),
        build_write_register(register::MOTION_PLUS_ACTIVATE, &[0x04], rumble),
    ]
}

/// Build an accelerometer calibration read (EEPROM)
pub fn build_accel_calibration_request(rumble: bool) -> Vec<u8> {
    build_read_memory(
        register::ACCEL_CALIBRATION,
        register::ACCEL_CALIBRATION_LEN,
        false,
        rumble,
    )
}

/// Build the IR camera enable sequence for the given data format
pub fn build_ir_setup(mode: IrMode, rumble: bool) -> Vec<Vec<u8>> {
    let enable = FLAG_ENABLE | rumble_bit(rumble);
    vec![
        vec![output::IR_PIXEL_CLOCK, enable],
        vec![output::IR_CAMERA_ENABLE, enable],
        build_write_register(register::IR_ENABLE, &[0x08], rumble),
        build_write_register(register::IR_SENSITIVITY_1, &IR_SENSITIVITY_BLOCK_1, rumble),
        build_write_register(register::IR_SENSITIVITY_2, &IR_SENSITIVITY_BLOCK_2, rumble),
        build_write_register(register::IR_MODE, &[mode as u8], rumble),
        build_write_register(register::IR_ENABLE, &[0x08], rumble),
    ]
}

/// Build the IR camera disable sequence
pub fn build_ir_disable(rumble: bool) -> Vec<Vec<u8>> {
    let disable = rumble_bit(rumble);
    vec![
        vec![output::IR_PIXEL_CLOCK, disable],
        vec![output::IR_CAMERA_ENABLE, disable],
    ]
}
