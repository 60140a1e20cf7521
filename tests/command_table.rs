use robot_bridge_lib::serial::command_table::resolve;
use robot_bridge_lib::serial::protocol::encode_command;
use robot_bridge_lib::serial::MoveCommand;

#[test]
fn documented_opcodes() {
    let expected = [
        ("forward", 0x50),
        ("backward", 0x52),
        ("left", 0x54),
        ("right", 0x56),
        ("turn-left", 0x58),
        ("turn-right", 0x5A),
    ];
    for (name, opcode) in expected {
        let command = resolve(name).unwrap_or_else(|| panic!("{} should resolve", name));
        assert_eq!(command.opcode(), opcode, "opcode for {}", name);
        assert_eq!(command.name(), name);
    }
    assert_eq!(MoveCommand::ALL.len(), expected.len());
}

#[test]
fn names_outside_the_table_are_not_found() {
    for name in ["hover", "stop", "FORWARD", "forward ", "turn left", "turnleft", "", "F", "TL"] {
        assert_eq!(resolve(name), None, "{:?} should not resolve", name);
    }
}

#[test]
fn forward_frame_bytes() {
    let command = resolve("forward").unwrap();
    assert_eq!(encode_command(command.opcode()), vec![0x80, 0x50, 0x81]);
}
