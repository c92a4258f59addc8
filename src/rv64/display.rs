use super::*;
use std::fmt::{Debug, Display, Formatter, Result};

fn lower<T: Debug>(f: &mut Formatter<'_>, x: T) -> Result {
    write!(f, "{}", format!("{:?}", x).to_lowercase())
}

macro_rules! display_lower {
    ($t:ty) => {
        impl Display for $t {
            fn fmt(&self, f: &mut Formatter<'_>) -> Result {
                lower(f, self)
            }
        }
    };
}

display_lower!(BOP);
display_lower!(LOP);
display_lower!(SOP);
display_lower!(AOP);
display_lower!(MOP);

impl Display for RV64 {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            LUI { rd, imm } => write!(f, "lui x{}, {:x}", rd, imm),
            AUIPC { rd, imm } => write!(f, "auipc x{}, {:x}", rd, imm),
            JAL { rd, imm } => write!(f, "jal x{}, {:x}", rd, imm),
            JALR { rd, rs1, imm } => write!(f, "jalr x{}, x{}, {:x}", rd, rs1, imm),
            BR { bop, rs1, rs2, imm } => write!(f, "{} x{}, x{}, {:x}", bop, rs1, rs2, imm),
            LOAD { lop, rd, rs1, imm } => write!(f, "{} x{}, x{}, {:x}", lop, rd, rs1, imm),
            STORE { sop, rs1, rs2, imm } => write!(f, "{} x{}, x{}, {:x}", sop, rs1, rs2, imm),
            ALUI { aop, rd, rs1, imm } => write!(f, "{}i x{}, x{}, {:x}", aop, rd, rs1, imm),
            ALUIW { aop, rd, rs1, imm } => write!(f, "{}iw x{}, x{}, {:x}", aop, rd, rs1, imm),
            ALU { aop, rd, rs1, rs2 } => write!(f, "{} x{}, x{}, x{}", aop, rd, rs1, rs2),
            ALUW { aop, rd, rs1, rs2 } => write!(f, "{}w x{}, x{}, x{}", aop, rd, rs1, rs2),
            MULDIV { mop, rd, rs1, rs2 } => write!(f, "{} x{}, x{}, x{}", mop, rd, rs1, rs2),
            MULDIVW { mop, rd, rs1, rs2 } => write!(f, "{}w x{}, x{}, x{}", mop, rd, rs1, rs2),
            _ => lower(f, self),
        }
    }
}

impl Display for Inst {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        // pc is 64-bit, but the image caps at 1 MiB so six hex digits
        // cover every in-image address; a wild pc just widens its column
        const PREFIX: usize = 6 + 1 + 8 + 1; // pc, space, word, space
        let asm = format!("{}", self.inst);
        match f.width() {
            Some(w) => {
                let w = w.saturating_sub(PREFIX);
                write!(f, "{:06x} {:08x} {:w$}", self.pc, self.word, asm)
            }
            None => write!(f, "{:06x} {:08x} {}", self.pc, self.word, asm),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_render() {
        let cases: &[(RV64, &str)] = &[
            (LUI { rd: 10, imm: 0x12345000 }, "lui x10, 12345000"),
            (BR { bop: BNE, rs1: 1, rs2: 3, imm: 8 }, "bne x1, x3, 8"),
            (LOAD { lop: LD, rd: 1, rs1: 0, imm: 8 }, "ld x1, x0, 8"),
            (STORE { sop: SD, rs1: 2, rs2: 5, imm: 0 }, "sd x2, x5, 0"),
            (ALUI { aop: ADD, rd: 5, rs1: 0, imm: 42 }, "addi x5, x0, 2a"),
            (ALUIW { aop: SRA, rd: 7, rs1: 1, imm: 1 }, "sraiw x7, x1, 1"),
            (ALUW { aop: SUB, rd: 4, rs1: 0, rs2: 1 }, "subw x4, x0, x1"),
            (MULDIV { mop: MULHSU, rd: 6, rs1: 1, rs2: 2 }, "mulhsu x6, x1, x2"),
            (MULDIVW { mop: REMU, rd: 3, rs1: 1, rs2: 2 }, "remuw x3, x1, x2"),
            (FENCE, "fence"),
            (EBREAK, "ebreak"),
        ];
        for (inst, want) in cases {
            assert_eq!(format!("{inst}"), *want);
        }
    }

    #[test]
    fn test_render_inst() {
        let inst = Inst { pc: 4, word: 0x00100073, inst: EBREAK };
        assert_eq!(format!("{inst}"), "000004 00100073 ebreak");
        // an explicit width pads the assembly column
        assert_eq!(format!("{inst:25}"), "000004 00100073 ebreak   ");
    }
}
