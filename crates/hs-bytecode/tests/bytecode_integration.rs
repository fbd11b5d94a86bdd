//! Integration tests for instruction encoding and module files

use hs_bytecode::{
    assemble, decode, disassemble_module, encode, verify_module, Constant, Instruction, Module,
    Opcode, OperandShape, Operands, SHAPES,
};

const REG_SAMPLES: [u8; 4] = [0, 1, 7, 255];
const IMM_SAMPLES: [u16; 5] = [0, 1, 0x00FF, 0x8000, 0xFFFF];

fn operand_samples(shape: OperandShape) -> Vec<Operands> {
    let mut out = Vec::new();
    match shape {
        OperandShape::None => out.push(Operands::None),
        OperandShape::OneReg => out.extend(REG_SAMPLES.iter().map(|&a| Operands::Regs1(a))),
        OperandShape::TwoReg => {
            for &a in &REG_SAMPLES {
                for &b in &REG_SAMPLES {
                    out.push(Operands::Regs2(a, b));
                }
            }
        }
        OperandShape::ThreeReg => {
            for &a in &REG_SAMPLES {
                for &b in &REG_SAMPLES {
                    for &c in &REG_SAMPLES {
                        out.push(Operands::Regs3(a, b, c));
                    }
                }
            }
        }
        OperandShape::Imm => out.extend(IMM_SAMPLES.iter().map(|&i| Operands::Imm(i))),
        OperandShape::ImmReg => {
            for &a in &REG_SAMPLES {
                for &i in &IMM_SAMPLES {
                    out.push(Operands::ImmReg(a, i));
                }
            }
        }
    }
    out
}

#[test]
fn test_encode_decode_round_trip_for_every_opcode() {
    for &op in Opcode::ALL {
        for operands in operand_samples(op.shape()) {
            let word = encode(op, operands).unwrap();
            let decoded = decode(word);
            assert_eq!(decoded.op(), Some(op), "{word:#010x}");
            assert_eq!(decoded.operands, operands, "{}", op.name());
            assert_eq!(decoded.encode(), word);
        }
    }
}

#[test]
fn test_every_word_with_assigned_opcode_round_trips() {
    // Re-encoding a decoded word keeps the opcode and every meaningful field.
    for byte in 0..=255u8 {
        let word = (byte as u32) << 24 | 0x00AB_CDEF;
        let decoded = decode(word);
        let mask = match SHAPES[byte as usize] {
            OperandShape::None => 0xFF00_0000,
            OperandShape::OneReg => 0xFFFF_0000,
            OperandShape::TwoReg => 0xFFFF_FF00,
            OperandShape::Imm => 0xFF00_FFFF,
            OperandShape::ThreeReg | OperandShape::ImmReg => 0xFFFF_FFFF,
        };
        assert_eq!(decoded.encode(), word & mask);
    }
}

#[test]
fn test_spec_decode_scenario() {
    let ins = decode(0x8C01_0203);
    assert_eq!(ins.opcode, 0x8C);
    assert_eq!(SHAPES[0x8C], OperandShape::ThreeReg);
    assert_eq!(ins.operands, Operands::Regs3(0x01, 0x02, 0x03));
}

#[test]
fn test_assembled_module_survives_file_round_trip() {
    let source = "
        .const big big 340282366920938463463374607431768211456
        .const add native add
        .func main start 0
        .func helper help 1
        start:
            RESERVE_ARGS 1
            LOAD_INT_CONST r0, 5
            SET_ARG r0, 0
            DECLARE_FUNCTION r1, helper
            LOCAL_CALL r2, r1
            RETURN r2
        help:
            LOAD_ARG r0, 0
            INT_INC r0
            RETURN r0
    ";
    let module = assemble("calls", source).unwrap();
    verify_module(&module).unwrap();

    let bytes = module.encode();
    let loaded = Module::decode(&bytes).unwrap();
    assert_eq!(loaded, module);
    assert_eq!(loaded.function("helper").map(|(i, f)| (i, f.entry)), Some((1, 6)));
    assert!(matches!(loaded.constants.get(0), Some(Constant::BigInt(_))));

    let listing = disassemble_module(&loaded);
    assert!(listing.contains("helper:  ; params=1"));
    assert!(listing.contains("LOCAL_CALL r2, r1"));
}

#[test]
fn test_verifier_catches_hand_built_errors() {
    let mut module = Module::new("bad");
    module.code.push(
        Instruction::new(Opcode::LoadLocalConst, Operands::ImmReg(0, 3))
            .unwrap()
            .encode(),
    );
    assert!(verify_module(&module).is_err());
}
