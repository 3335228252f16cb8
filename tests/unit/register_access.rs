//! Unit tests for register access and channel enable bookkeeping

use crate::common::{Operation, ch, create_mock_driver};
use ad7124::{Error, Profile, RegisterError, RegisterId, Setup};

#[test]
fn test_init_writes_profile() {
    let (driver, interface) = create_mock_driver(Profile::A);

    // Device holds the profile's read-write registers
    for register in driver.registers().iter() {
        if register.access == ad7124::Access::ReadWrite {
            assert_eq!(
                interface.register(register.address),
                register.value,
                "register 0x{:02X} not loaded",
                register.address
            );
        }
    }
    assert_eq!(interface.enabled_mask(), 0x007F);
    assert_eq!(interface.resets(), 1);
}

#[test]
fn test_init_skips_read_only_registers() {
    let (mut driver, interface) = create_mock_driver(Profile::A);
    driver.init().unwrap();

    let ops = interface.operations();
    assert_eq!(ops[0], Operation::Reset);
    for read_only in [0x00u8, 0x02, 0x05, 0x06, 0x08] {
        assert!(
            interface.writes_to(read_only).is_empty(),
            "read-only register 0x{:02X} written",
            read_only
        );
    }
}

#[test]
fn test_init_waits_for_power_on_flag() {
    let (mut driver, interface) = create_mock_driver(Profile::PowerOn);
    driver.init().unwrap();

    // First status read after reset still shows POR, second one is clear
    let status_reads = interface
        .operations()
        .iter()
        .filter(|op| matches!(op, Operation::Read { address: 0x00, .. }))
        .count();
    assert_eq!(status_reads, 2);
}

#[test]
fn test_enable_disable_every_channel() {
    let (mut driver, interface) = create_mock_driver(Profile::PowerOn);

    for index in 0..16 {
        let channel = ch(index);

        driver.enable_channel(channel).unwrap();
        assert!(driver.enabled_channels().contains(channel));
        assert_ne!(interface.enabled_mask() & (1 << index), 0);

        driver.disable_channel(channel).unwrap();
        assert!(!driver.enabled_channels().contains(channel));
        assert_eq!(interface.enabled_mask() & (1 << index), 0);
    }

    // Everything off; mirror and device agree
    assert!(driver.enabled_channels().is_empty());
    assert_eq!(interface.enabled_mask(), 0);
}

#[test]
fn test_enable_preserves_channel_fields() {
    let (mut driver, interface) = create_mock_driver(Profile::A);
    let before = interface.register(0x09 + 2);

    driver.disable_channel(ch(2)).unwrap();
    assert_eq!(interface.register(0x09 + 2), before & !0x8000);

    driver.enable_channel(ch(2)).unwrap();
    assert_eq!(interface.register(0x09 + 2), before);
}

#[test]
fn test_failed_write_not_mirrored() {
    let (mut driver, interface) = create_mock_driver(Profile::A);

    interface.fail_next_write();
    let result = driver.disable_channel(ch(3));
    assert!(matches!(result, Err(Error::Bus(_))));

    // Neither the mirror nor the device saw the change
    assert!(driver.enabled_channels().contains(ch(3)));
    assert_eq!(driver.enabled_channels().bits(), 0x007F);
    assert_eq!(interface.enabled_mask(), 0x007F);
}

#[test]
fn test_write_read_only_register_rejected() {
    let (mut driver, interface) = create_mock_driver(Profile::A);

    let result = driver.write_register(RegisterId::Id, 0x55);
    assert!(matches!(
        result,
        Err(Error::Register(RegisterError::ReadOnly(0x05)))
    ));
    assert!(interface.operations().is_empty(), "no bus traffic expected");
}

#[test]
fn test_write_oversized_value_rejected() {
    let (mut driver, interface) = create_mock_driver(Profile::A);

    let result = driver.write_register(RegisterId::AdcControl, 0x1_0000);
    assert!(matches!(
        result,
        Err(Error::Register(RegisterError::ValueOutOfRange { .. }))
    ));
    assert!(interface.operations().is_empty());
}

#[test]
fn test_write_uses_register_size() {
    let (mut driver, interface) = create_mock_driver(Profile::A);
    let setup = Setup::new(4).unwrap();

    driver
        .write_register(RegisterId::Filter(setup), 0x06_0123)
        .unwrap();

    assert_eq!(
        interface.operations(),
        vec![Operation::Write {
            address: 0x21 + 4,
            value: 0x06_0123
        }]
    );
    assert_eq!(driver.registers().value(RegisterId::Filter(setup)), 0x06_0123);
}

#[test]
fn test_read_register_updates_mirror() {
    let (mut driver, interface) = create_mock_driver(Profile::A);
    let setup = Setup::new(1).unwrap();

    interface.set_register(0x29 + 1, 0x80_0042);
    let value = driver.read_register(RegisterId::Offset(setup)).unwrap();

    assert_eq!(value, 0x80_0042);
    assert_eq!(driver.registers().value(RegisterId::Offset(setup)), 0x80_0042);
    assert_eq!(
        interface.operations(),
        vec![Operation::Read {
            address: 0x29 + 1,
            len: 3
        }]
    );
}

#[test]
fn test_read_id() {
    let (mut driver, _interface) = create_mock_driver(Profile::PowerOn);
    assert_eq!(driver.read_id().unwrap(), 0x14);
}

#[test]
fn test_read_failure_propagates() {
    let (mut driver, interface) = create_mock_driver(Profile::A);

    interface.fail_next_read();
    assert!(matches!(driver.read_status(), Err(Error::Bus(_))));
}

#[test]
fn test_load_profile_replaces_map() {
    let (mut driver, interface) = create_mock_driver(Profile::A);
    assert_eq!(driver.enabled_channels().bits(), 0x007F);

    driver.load_profile(Profile::B).unwrap();

    assert_eq!(driver.enabled_channels().bits(), 0x000F);
    assert_eq!(interface.enabled_mask(), 0x000F);
    assert_eq!(
        interface.register(0x01),
        Profile::B.register_map().value(RegisterId::AdcControl)
    );
    assert_eq!(interface.resets(), 2);
}

#[test]
fn test_failed_profile_load_mirrors_confirmed_writes() {
    let (mut driver, interface) = create_mock_driver(Profile::B);
    // First write to CHANNEL_4 during the reload fails
    interface.fail_write_to(0x09 + 4, 1);

    let result = driver.load_profile(Profile::A);
    assert!(matches!(result, Err(Error::Bus(_))));

    // Power-on values plus channels 0-3 of profile A reached the device
    assert_eq!(interface.enabled_mask(), 0x000F);
    assert_eq!(driver.enabled_channels().bits(), interface.enabled_mask());
    for register in driver.registers().iter() {
        if register.access == ad7124::Access::ReadWrite {
            assert_eq!(
                register.value,
                interface.register(register.address),
                "register 0x{:02X} mirrors a value the device does not hold",
                register.address
            );
        }
    }

    // Profile A is retried by the next init
    assert_eq!(driver.profile(), Profile::A);
    driver.init().unwrap();
    assert_eq!(driver.enabled_channels().bits(), 0x007F);
    assert_eq!(interface.enabled_mask(), 0x007F);
}

#[test]
fn test_init_starts_from_power_on_mirror() {
    let (mut driver, interface) = create_mock_driver(Profile::A);
    driver.disable_channel(ch(3)).unwrap();
    interface.fail_write_to(0x01, 1);

    assert!(driver.init().is_err());

    // Reset happened; ADC_CONTROL was rejected and keeps its power-on value
    assert_eq!(driver.registers().value(RegisterId::AdcControl), 0x0000);
    assert_eq!(interface.register(0x01), 0x0000);
    assert_eq!(driver.enabled_channels().bits(), 0x0001);
}

#[test]
fn test_restore_channels_writes_only_differences() {
    let (mut driver, interface) = create_mock_driver(Profile::A);

    driver.disable_channel(ch(1)).unwrap();
    driver.enable_channel(ch(9)).unwrap();
    interface.clear_operations();

    driver
        .restore_channels(ad7124::ChannelMask::from_bits(0x007F))
        .unwrap();

    assert_eq!(interface.operations().len(), 2);
    assert_eq!(interface.writes_to(0x09 + 1).len(), 1);
    assert_eq!(interface.writes_to(0x09 + 9).len(), 1);
    assert_eq!(interface.enabled_mask(), 0x007F);
}

#[test]
fn test_restore_channels_attempts_every_channel() {
    let (mut driver, interface) = create_mock_driver(Profile::A);

    for index in 0..7 {
        driver.disable_channel(ch(index)).unwrap();
    }
    interface.fail_write_to(0x09 + 2, 1);

    let result = driver.restore_channels(ad7124::ChannelMask::from_bits(0x007F));
    assert!(result.is_err());

    // Every channel except the failed one is back
    assert_eq!(interface.enabled_mask(), 0x007F & !(1 << 2));
    assert_eq!(driver.enabled_channels().bits(), 0x007F & !(1 << 2));
}
