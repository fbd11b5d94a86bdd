//! Opcode definitions and the static operand-shape table

/// Operand layout of a 32-bit instruction word
///
/// The opcode always occupies bits 31..24. The remaining 24 bits hold:
///
/// | Shape      | 23..16 | 15..8 | 7..0 |
/// |------------|--------|-------|------|
/// | `None`     | -      | -     | -    |
/// | `OneReg`   | r1     | -     | -    |
/// | `TwoReg`   | r1     | r2    | -    |
/// | `ThreeReg` | r1     | r2    | r3   |
/// | `Imm`      | -      | imm hi| imm lo |
/// | `ImmReg`   | r1     | imm hi| imm lo |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandShape {
    /// No operands
    None,
    /// One register
    OneReg,
    /// Two registers
    TwoReg,
    /// Three registers
    ThreeReg,
    /// A 16-bit immediate
    Imm,
    /// One register and a 16-bit immediate
    ImmReg,
}

impl OperandShape {
    /// Number of register operands
    pub const fn register_count(self) -> usize {
        match self {
            OperandShape::None | OperandShape::Imm => 0,
            OperandShape::OneReg | OperandShape::ImmReg => 1,
            OperandShape::TwoReg => 2,
            OperandShape::ThreeReg => 3,
        }
    }

    /// Whether a 16-bit immediate is present
    pub const fn has_immediate(self) -> bool {
        matches!(self, OperandShape::Imm | OperandShape::ImmReg)
    }
}

/// Defines [`Opcode`], its byte mapping, mnemonics and the [`SHAPES`] table
/// from one list so they cannot drift apart.
macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $code:literal, $mnemonic:literal, $shape:ident;
        )*
    ) => {
        /// Humming Script VM opcodes
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $code,
            )*
        }

        impl Opcode {
            /// Every assigned opcode, in numeric order
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name,)*];

            /// Convert a byte to an opcode; unassigned values yield `None`
            pub fn from_u8(byte: u8) -> Option<Self> {
                match byte {
                    $($code => Some(Opcode::$name),)*
                    _ => None,
                }
            }

            /// Assembly mnemonic
            pub const fn name(self) -> &'static str {
                match self {
                    $(Opcode::$name => $mnemonic,)*
                }
            }

            /// Look up an opcode by its mnemonic
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($mnemonic => Some(Opcode::$name),)*
                    _ => None,
                }
            }
        }

        /// Operand shape for every opcode byte; unassigned entries are `None`
        pub static SHAPES: [OperandShape; 256] = {
            let mut table = [OperandShape::None; 256];
            $(table[$code] = OperandShape::$shape;)*
            table
        };
    };
}

define_opcodes! {
    // ===== Misc (1-3) =====

    /// Do nothing
    Nop = 1, "NOP", None;
    /// Log frame state and continue
    Breakpoint = 2, "BREAKPOINT", None;
    /// Stop the frame with a null result
    Halt = 3, "HALT", None;

    // ===== Loads (10-21) =====

    /// `r1 = null`
    LoadNull = 10, "LOAD_NULL", OneReg;
    /// `r1 = false`
    LoadFalse = 11, "LOAD_FALSE", OneReg;
    /// `r1 = true`
    LoadTrue = 12, "LOAD_TRUE", OneReg;
    /// `r1 = args[r2]`
    LoadArgIndirect = 13, "LOAD_ARG_INDIRECT", TwoReg;
    /// `r1 = args[imm]`
    LoadArg = 14, "LOAD_ARG", ImmReg;
    /// `r1 = locals[imm]`
    LoadLocal = 15, "LOAD_LOCAL", ImmReg;
    /// `r1 = locals[r2]`
    LoadLocalIndirect = 16, "LOAD_LOCAL_INDIRECT", TwoReg;
    /// `r1 = this.<const imm>`
    LoadField = 17, "LOAD_FIELD", ImmReg;
    /// `r1 = r2.<r3>`
    LoadFieldIndirect = 18, "LOAD_FIELD_INDIRECT", ThreeReg;
    /// `r1 = constants[imm]`
    LoadLocalConst = 19, "LOAD_LOCAL_CONST", ImmReg;
    /// `r1 = constants[r2]`
    LoadLocalConstIndirect = 20, "LOAD_LOCAL_CONST_INDIRECT", TwoReg;
    /// `r1 = imm as i16`
    LoadIntConst = 21, "LOAD_INT_CONST", ImmReg;

    // ===== Stores (30-33) =====

    /// `locals[imm] = r1`
    StoreLocal = 30, "STORE_LOCAL", ImmReg;
    /// `locals[r2] = r1`
    StoreLocalIndirect = 31, "STORE_LOCAL_INDIRECT", TwoReg;
    /// `this.<const imm> = r1`
    StoreField = 32, "STORE_FIELD", ImmReg;
    /// `r1.<r2> = r3`
    StoreFieldIndirect = 33, "STORE_FIELD_INDIRECT", ThreeReg;

    // ===== Moves (40) =====

    /// `r1 = r2`
    Move = 40, "MOVE", TwoReg;

    // ===== Value stack (50-53) =====

    /// Pop the value stack into `r1`
    StackPop = 50, "STACK_POP", OneReg;
    /// Push `r1` onto the value stack
    StackPush = 51, "STACK_PUSH", OneReg;
    /// Copy the top of the value stack into `r1`
    StackPeek = 52, "STACK_PEEK", OneReg;
    /// Duplicate the top of the value stack
    StackDup = 53, "STACK_DUP", None;

    // ===== Jumps (60-85) =====

    /// `pc = imm`
    Jump = 60, "JUMP", Imm;
    /// `if r1 == r2 { pc = r3 }`
    JumpEqReg = 61, "JUMP_EQ_REG", ThreeReg;
    /// `if r1 != r2 { pc = r3 }`
    JumpNeReg = 62, "JUMP_NE_REG", ThreeReg;
    /// `if r1 < r2 { pc = r3 }`
    JumpLtReg = 63, "JUMP_LT_REG", ThreeReg;
    /// `if r1 <= r2 { pc = r3 }`
    JumpLeReg = 64, "JUMP_LE_REG", ThreeReg;
    /// `if r1 > r2 { pc = r3 }`
    JumpGtReg = 65, "JUMP_GT_REG", ThreeReg;
    /// `if r1 >= r2 { pc = r3 }`
    JumpGeReg = 66, "JUMP_GE_REG", ThreeReg;
    /// `if r1 == 0 { pc = imm }`
    JumpEqZero = 67, "JUMP_EQ_ZERO", ImmReg;
    /// `if r1 != 0 { pc = imm }`
    JumpNeZero = 68, "JUMP_NE_ZERO", ImmReg;
    /// `if r1 < 0 { pc = imm }`
    JumpLtZero = 69, "JUMP_LT_ZERO", ImmReg;
    /// `if r1 <= 0 { pc = imm }`
    JumpLeZero = 70, "JUMP_LE_ZERO", ImmReg;
    /// `if r1 > 0 { pc = imm }`
    JumpGtZero = 71, "JUMP_GT_ZERO", ImmReg;
    /// `if r1 >= 0 { pc = imm }`
    JumpGeZero = 72, "JUMP_GE_ZERO", ImmReg;
    /// `pc = r1`
    JumpIndirect = 73, "JUMP_INDIRECT", OneReg;
    /// `if r1 == 0 { pc = r2 }`
    JumpEqZeroIndirect = 80, "JUMP_EQ_ZERO_INDIRECT", TwoReg;
    /// `if r1 != 0 { pc = r2 }`
    JumpNeZeroIndirect = 81, "JUMP_NE_ZERO_INDIRECT", TwoReg;
    /// `if r1 < 0 { pc = r2 }`
    JumpLtZeroIndirect = 82, "JUMP_LT_ZERO_INDIRECT", TwoReg;
    /// `if r1 <= 0 { pc = r2 }`
    JumpLeZeroIndirect = 83, "JUMP_LE_ZERO_INDIRECT", TwoReg;
    /// `if r1 > 0 { pc = r2 }`
    JumpGtZeroIndirect = 84, "JUMP_GT_ZERO_INDIRECT", TwoReg;
    /// `if r1 >= 0 { pc = r2 }`
    JumpGeZeroIndirect = 85, "JUMP_GE_ZERO_INDIRECT", TwoReg;

    // ===== Returns (90-92) =====

    /// Return `r1` to the caller
    Return = 90, "RETURN", OneReg;
    /// Return null to the caller
    ReturnNull = 91, "RETURN_NULL", None;
    /// Return `this` to the caller
    ReturnSelf = 92, "RETURN_SELF", None;

    // ===== Calls (100-106) =====

    /// Reserve `imm` outgoing argument slots
    ReserveArgs = 100, "RESERVE_ARGS", Imm;
    /// Reserve `r1` outgoing argument slots
    ReserveArgsIndirect = 101, "RESERVE_ARGS_INDIRECT", OneReg;
    /// `outgoing[imm] = r1`
    SetArg = 102, "SET_ARG", ImmReg;
    /// `outgoing[r2] = r1`
    SetArgIndirect = 103, "SET_ARG_INDIRECT", TwoReg;
    /// `r1 = this.<r2>(outgoing...)`
    Call = 104, "CALL", TwoReg;
    /// `r1 = r2(outgoing...)` where `r2` names a module function or native
    LocalCall = 105, "LOCAL_CALL", TwoReg;
    /// `r1 = r3(outgoing...)` with `this = r2`
    DynamicCall = 106, "DYNAMIC_CALL", ThreeReg;

    // ===== Frame context (110-121) =====

    /// `this = r1`
    SetThis = 110, "SET_THIS", OneReg;
    /// `module = r1`
    SetModule = 111, "SET_MODULE", OneReg;
    /// `r1 = this`
    GetThis = 120, "GET_THIS", OneReg;
    /// `r1 = module`
    GetModule = 121, "GET_MODULE", OneReg;

    // ===== Booleans (130-134) =====

    /// `r1 = r2 && r3`
    BoolAnd = 130, "BOOL_AND", ThreeReg;
    /// `r1 = r2 || r3`
    BoolOr = 131, "BOOL_OR", ThreeReg;
    /// `r1 = r2 ^ r3`
    BoolXor = 132, "BOOL_XOR", ThreeReg;
    /// `r1 = cmp(r2, r3)` as -1, 0 or 1
    BoolCmp = 133, "BOOL_CMP", ThreeReg;
    /// `r1 = !r2`
    BoolNot = 134, "BOOL_NOT", TwoReg;

    // ===== Integers (140-156) =====

    /// `r1 = r2 + r3` (wrapping)
    IntAdd = 140, "INT_ADD", ThreeReg;
    /// `r1 = r2 - r3` (wrapping)
    IntSub = 141, "INT_SUB", ThreeReg;
    /// `r1 = r2 * r3` (wrapping)
    IntMul = 142, "INT_MUL", ThreeReg;
    /// `r1 = r2 / r3`, truncating
    IntDiv = 143, "INT_DIV", ThreeReg;
    /// `r1 = r2 mod r3`, floored
    IntMod = 144, "INT_MOD", ThreeReg;
    /// `r1 = r2 rem r3`, truncated
    IntRem = 145, "INT_REM", ThreeReg;
    /// `r1 = r2 << r3`
    IntShl = 146, "INT_SHL", ThreeReg;
    /// `r1 = r2 >> r3` (arithmetic)
    IntShr = 147, "INT_SHR", ThreeReg;
    /// `r1 = r2 << r3` (logical)
    IntLsl = 148, "INT_LSL", ThreeReg;
    /// `r1 = r2 >>> r3` (logical)
    IntLsr = 149, "INT_LSR", ThreeReg;
    /// `r1 = r2 & r3`
    IntAnd = 150, "INT_AND", ThreeReg;
    /// `r1 = r2 | r3`
    IntOr = 151, "INT_OR", ThreeReg;
    /// `r1 = r2 ^ r3`
    IntXor = 152, "INT_XOR", ThreeReg;
    /// `r1 = cmp(r2, r3)` as -1, 0 or 1
    IntCmp = 153, "INT_CMP", ThreeReg;
    /// `r1 = -r2` (wrapping)
    IntNeg = 154, "INT_NEG", TwoReg;
    /// `r1 = !r2`
    IntCpl = 155, "INT_CPL", TwoReg;
    /// `r1 = r2 ** r3` (wrapping)
    IntPow = 156, "INT_POW", ThreeReg;

    // ===== Floats (160-178) =====

    /// `r1 = r2 + r3`
    FloatAdd = 160, "FLOAT_ADD", ThreeReg;
    /// `r1 = r2 - r3`
    FloatSub = 161, "FLOAT_SUB", ThreeReg;
    /// `r1 = r2 * r3`
    FloatMul = 162, "FLOAT_MUL", ThreeReg;
    /// `r1 = r2 / r3`
    FloatDiv = 163, "FLOAT_DIV", ThreeReg;
    /// `r1 = sqrt(r2)`
    FloatSqrt = 164, "FLOAT_SQRT", TwoReg;
    /// `r1 = e ** r2`
    FloatExp = 165, "FLOAT_EXP", TwoReg;
    /// `r1 = r2 ** r3`
    FloatPow = 166, "FLOAT_POW", ThreeReg;
    /// `r1 = log2(r2)`
    FloatLog2 = 167, "FLOAT_LOG2", TwoReg;
    /// `r1 = log10(r2)`
    FloatLog = 168, "FLOAT_LOG", TwoReg;
    /// `r1 = ln(r2)`
    FloatLn = 169, "FLOAT_LN", TwoReg;
    /// `r1 = sin(r2)`
    FloatSin = 170, "FLOAT_SIN", TwoReg;
    /// `r1 = cos(r2)`
    FloatCos = 171, "FLOAT_COS", TwoReg;
    /// `r1 = tan(r2)`
    FloatTan = 172, "FLOAT_TAN", TwoReg;
    /// `r1 = asin(r2)`
    FloatAsin = 173, "FLOAT_ASIN", TwoReg;
    /// `r1 = acos(r2)`
    FloatAcos = 174, "FLOAT_ACOS", TwoReg;
    /// `r1 = atan(r2)`
    FloatAtan = 175, "FLOAT_ATAN", TwoReg;
    /// `r1 = atan2(r2, r3)`
    FloatAtan2 = 176, "FLOAT_ATAN2", ThreeReg;
    /// `r1 = -r2`
    FloatNeg = 177, "FLOAT_NEG", TwoReg;
    /// `r1 = cmp(r2, r3)` as -1, 0 or 1 (IEEE total order)
    FloatCmp = 178, "FLOAT_CMP", ThreeReg;

    // ===== Conversions (180-183) =====

    /// `r1 = r2 as int`
    Bool2Int = 180, "BOOL2INT", TwoReg;
    /// `r1 = r2 != 0`
    Int2Bool = 181, "INT2BOOL", TwoReg;
    /// `r1 = r2 as float`
    Int2Float = 182, "INT2FLOAT", TwoReg;
    /// `r1 = r2 as int` (saturating)
    Float2Int = 183, "FLOAT2INT", TwoReg;

    // ===== Objects (190-191) =====

    /// `r1 = {}`
    New = 190, "NEW", OneReg;
    /// `r1 = {}` with prototype `r2`
    Extend = 191, "EXTEND", TwoReg;

    // ===== Boxing (200-203) =====

    /// `r1 = box(r2 as bool)`
    BoxBool = 200, "BOX_BOOL", TwoReg;
    /// `r1 = bignum(r2 as int)`
    BoxInt = 201, "BOX_INT", TwoReg;
    /// `r1 = box(r2 as float)`
    BoxFloat = 202, "BOX_FLOAT", TwoReg;
    /// `r1 = unbox(r2)`
    Unbox = 203, "UNBOX", TwoReg;

    // ===== Locks (210-211) =====

    /// Acquire the lock named by `r1`
    Lock = 210, "LOCK", OneReg;
    /// Release the lock named by `r1`
    Unlock = 211, "UNLOCK", OneReg;

    // ===== Arrays (220-224) =====

    /// `r1 = [null; imm]`
    ArrayNew = 220, "ARRAY_NEW", ImmReg;
    /// `r1 = [null; r2]`
    ArrayNewIndirect = 221, "ARRAY_NEW_INDIRECT", TwoReg;
    /// `r1 = r2[r3]`
    ArrayGet = 222, "ARRAY_GET", ThreeReg;
    /// `r1[r2] = r3`
    ArraySet = 223, "ARRAY_SET", ThreeReg;
    /// Remove `r1[r2]`
    ArrayDelete = 224, "ARRAY_DELETE", TwoReg;

    // ===== Exceptions (230-236) =====

    /// Open a try context whose finalizer is at `imm`
    NewTryContext = 230, "NEW_TRY_CONTEXT", Imm;
    /// Open a try context whose finalizer is at `r1`
    NewTryContextIndirect = 231, "NEW_TRY_CONTEXT_INDIRECT", OneReg;
    /// Open a try context without a finalizer
    NewTryContextNoFinal = 232, "NEW_TRY_CONTEXT_NO_FINAL", None;
    /// Catch into `r1` and continue at `imm`
    AddCatch = 233, "ADD_CATCH", ImmReg;
    /// Catch into `r1` and continue at `r2`
    AddCatchIndirect = 234, "ADD_CATCH_INDIRECT", TwoReg;
    /// Throw `r1`
    Throw = 235, "THROW", OneReg;
    /// Close the innermost try context
    EndTryContext = 236, "END_TRY_CONTEXT", None;

    // ===== Increments (240-243) =====

    /// `r1 += 1` (wrapping)
    IntInc = 240, "INT_INC", OneReg;
    /// `r1 -= 1` (wrapping)
    IntDec = 241, "INT_DEC", OneReg;
    /// `r1 += 1.0`
    FloatInc = 242, "FLOAT_INC", OneReg;
    /// `r1 -= 1.0`
    FloatDec = 243, "FLOAT_DEC", OneReg;

    // ===== Functions (250-252) =====

    /// `r1 = function #imm`
    DeclareFunction = 250, "DECLARE_FUNCTION", ImmReg;
    /// `r1 = function #r2`
    DeclareFunctionIndirect = 251, "DECLARE_FUNCTION_INDIRECT", TwoReg;
    /// End of a function body; behaves like `RETURN_NULL`
    EndFunction = 252, "END_FUNCTION", None;
}

impl Opcode {
    /// Convert to raw byte
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Operand shape of this opcode
    pub fn shape(self) -> OperandShape {
        SHAPES[self as usize]
    }

    /// Whether this opcode may transfer control within the frame
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            Opcode::Jump
                | Opcode::JumpEqReg
                | Opcode::JumpNeReg
                | Opcode::JumpLtReg
                | Opcode::JumpLeReg
                | Opcode::JumpGtReg
                | Opcode::JumpGeReg
                | Opcode::JumpEqZero
                | Opcode::JumpNeZero
                | Opcode::JumpLtZero
                | Opcode::JumpLeZero
                | Opcode::JumpGtZero
                | Opcode::JumpGeZero
                | Opcode::JumpIndirect
                | Opcode::JumpEqZeroIndirect
                | Opcode::JumpNeZeroIndirect
                | Opcode::JumpLtZeroIndirect
                | Opcode::JumpLeZeroIndirect
                | Opcode::JumpGtZeroIndirect
                | Opcode::JumpGeZeroIndirect
        )
    }

    /// Whether the 16-bit immediate is a code address
    pub fn has_target_immediate(self) -> bool {
        matches!(
            self,
            Opcode::Jump
                | Opcode::JumpEqZero
                | Opcode::JumpNeZero
                | Opcode::JumpLtZero
                | Opcode::JumpLeZero
                | Opcode::JumpGtZero
                | Opcode::JumpGeZero
                | Opcode::NewTryContext
                | Opcode::AddCatch
        )
    }

    /// Whether this opcode invokes another function
    pub fn is_call(self) -> bool {
        matches!(self, Opcode::Call | Opcode::LocalCall | Opcode::DynamicCall)
    }

    /// Whether this opcode leaves the current frame
    pub fn is_return(self) -> bool {
        matches!(
            self,
            Opcode::Return | Opcode::ReturnNull | Opcode::ReturnSelf | Opcode::EndFunction
        )
    }

    /// Whether execution never falls through to the next instruction
    pub fn is_terminator(self) -> bool {
        self.is_return()
            || matches!(
                self,
                Opcode::Halt | Opcode::Jump | Opcode::JumpIndirect | Opcode::Throw
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_round_trip() {
        for &op in Opcode::ALL {
            assert_eq!(Opcode::from_u8(op.to_u8()), Some(op));
            assert_eq!(Opcode::from_name(op.name()), Some(op));
        }
    }

    #[test]
    fn test_unassigned_opcodes() {
        for byte in [0u8, 4, 22, 86, 125, 225, 229, 253, 255] {
            assert_eq!(Opcode::from_u8(byte), None);
            assert_eq!(SHAPES[byte as usize], OperandShape::None);
        }
    }

    #[test]
    fn test_opcode_values() {
        assert_eq!(Opcode::Nop as u8, 1);
        assert_eq!(Opcode::LoadIntConst as u8, 21);
        assert_eq!(Opcode::IntAdd as u8, 0x8C);
        assert_eq!(Opcode::FloatCmp as u8, 178);
        assert_eq!(Opcode::EndFunction as u8, 252);
    }

    #[test]
    fn test_shapes() {
        assert_eq!(Opcode::IntAdd.shape(), OperandShape::ThreeReg);
        assert_eq!(Opcode::Jump.shape(), OperandShape::Imm);
        assert_eq!(Opcode::LoadIntConst.shape(), OperandShape::ImmReg);
        assert_eq!(Opcode::Move.shape(), OperandShape::TwoReg);
        assert_eq!(Opcode::Return.shape(), OperandShape::OneReg);
        assert_eq!(Opcode::StackDup.shape(), OperandShape::None);
    }

    #[test]
    fn test_shape_queries() {
        assert_eq!(OperandShape::ImmReg.register_count(), 1);
        assert!(OperandShape::ImmReg.has_immediate());
        assert!(!OperandShape::ThreeReg.has_immediate());
    }

    #[test]
    fn test_control_flow_classification() {
        assert!(Opcode::JumpGeZeroIndirect.is_jump());
        assert!(Opcode::AddCatch.has_target_immediate());
        assert!(!Opcode::IntAdd.is_jump());
        assert!(Opcode::EndFunction.is_return());
        assert!(Opcode::Throw.is_terminator());
        assert!(Opcode::DynamicCall.is_call());
    }
}
