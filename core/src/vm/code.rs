use hashbrown::HashMap;

use crate::{
    String, Vec,
    vm::{Instruction, Label},
};

/// A finished method body.
#[derive(Clone, PartialEq)]
pub struct Code {
    pub instructions: Vec<Instruction>,
    /// Address of each label, indexed by label number.
    pub labels: Vec<usize>,
    pub strings: Vec<String>,
    pub max_stack_size: usize,
}

static_assertions::assert_impl_all!(Code: Send, Sync);

impl Code {
    pub fn label_address(&self, label: Label) -> Option<usize> {
        self.labels.get(label.0 as usize).copied()
    }

    /// Size of the encoded body in bytes.
    pub fn byte_len(&self) -> usize {
        self.instructions.iter().map(Instruction::encoded_len).sum()
    }
}

impl core::fmt::Debug for Code {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "Code {{")?;
        writeln!(f, "  max_stack_size: {}", self.max_stack_size)?;
        writeln!(f, "  byte_len: {}", self.byte_len())?;

        // Print string pool
        if !self.strings.is_empty() {
            writeln!(f, "  strings: [")?;
            for (i, string) in self.strings.iter().enumerate() {
                writeln!(f, "    [{}] = {:?}", i, string)?;
            }
            writeln!(f, "  ]")?;
        } else {
            writeln!(f, "  strings: []")?;
        }

        // Several labels can share an address; list them in label order.
        let mut labels_at: HashMap<usize, Vec<usize>> = HashMap::new();
        for (label, &addr) in self.labels.iter().enumerate() {
            labels_at.entry(addr).or_default().push(label);
        }
        let prefixes: HashMap<usize, String> = labels_at
            .into_iter()
            .map(|(addr, labels)| {
                let prefix = labels
                    .iter()
                    .map(|l| alloc::format!("L{}:", l))
                    .collect::<Vec<_>>()
                    .join(" ");
                (addr, prefix)
            })
            .collect();
        let width = prefixes.values().map(String::len).max().unwrap_or(0).max(4);

        writeln!(f, "  instructions:")?;
        for (addr, instr) in self.instructions.iter().enumerate() {
            let prefix = prefixes.get(&addr).map(String::as_str).unwrap_or("");
            match instr.branch_target().and_then(|target| self.label_address(target)) {
                Some(target) => writeln!(
                    f,
                    "    {:4} {:>width$}  {:?} (to @{})",
                    addr, prefix, instr, target
                )?,
                None => writeln!(f, "    {:4} {:>width$}  {:?}", addr, prefix, instr)?,
            }
        }

        // Labels bound past the last instruction.
        if let Some(prefix) = prefixes.get(&self.instructions.len()) {
            writeln!(f, "    {:4} {:>width$}", self.instructions.len(), prefix)?;
        }

        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_byte_len_counts_operands() {
        let code = Code {
            instructions: vec![
                Instruction::LdArg1,
                Instruction::LdArg(4),
                Instruction::Add,
                Instruction::Ret,
            ],
            labels: vec![],
            strings: vec![],
            max_stack_size: 2,
        };
        assert_eq!(code.byte_len(), 1 + 3 + 1 + 1);
    }

    #[test]
    fn test_listing_marks_labels() {
        let code = Code {
            instructions: vec![
                Instruction::LdArg0,
                Instruction::BrFalse(Label(0)),
                Instruction::LdcI4S(1),
                Instruction::StArg0,
                Instruction::Ret,
            ],
            labels: vec![4],
            strings: vec![],
            max_stack_size: 1,
        };

        let expected = indoc! {"
            Code {
              max_stack_size: 1
              byte_len: 10
              strings: []
              instructions:
                   0       ldarg.0
                   1       brfalse L0 (to @4)
                   2       ldc.i4.s 1
                   3       starg.0
                   4  L0:  ret
            }"};
        assert_eq!(format!("{:?}", code), expected);
    }

    #[test]
    fn test_listing_aligns_shared_labels() {
        let code = Code {
            instructions: vec![
                Instruction::LdArg0,
                Instruction::BrTrue(Label(1)),
                Instruction::Ret,
            ],
            labels: vec![2, 2],
            strings: vec![],
            max_stack_size: 1,
        };

        let expected = indoc! {"
            Code {
              max_stack_size: 1
              byte_len: 7
              strings: []
              instructions:
                   0          ldarg.0
                   1          brtrue L1 (to @2)
                   2 L0: L1:  ret
            }"};
        assert_eq!(format!("{:?}", code), expected);
    }
}
