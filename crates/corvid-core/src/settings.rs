//! Compiler settings supplied by the host.

use bitflags::bitflags;

use crate::BuiltinType;

bitflags! {
    /// Optimizations the semantic core may apply while lowering.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OptimizationFlags: u8 {
        /// Evaluate calls to functions with constant arguments at compile time.
        const FUNCTION_EVALUATING = 1 << 0;
        /// Substitute small function bodies at their call sites.
        const FUNCTION_INLINING = 1 << 1;
        /// Fold value expressions built from constants.
        const STATEMENT_EVALUATING = 1 << 2;
        /// Drop branches whose condition is a known constant.
        const TRIM_UNREACHABLE = 1 << 3;
    }
}

impl Default for OptimizationFlags {
    fn default() -> Self {
        Self::all()
    }
}

/// Numeric widths and optimization switches.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerSettings {
    /// Type of the `length` of arrays.
    pub array_length_type: BuiltinType,
    /// Type produced by comparison and logical operators.
    pub boolean_type: BuiltinType,
    /// Type produced by `sizeof`.
    pub size_of_type: BuiltinType,
    /// Type of the program's exit code.
    pub exit_code_type: BuiltinType,
    /// Size of a pointer in bytes.
    pub pointer_size: u32,
    pub optimizations: OptimizationFlags,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            array_length_type: BuiltinType::I32,
            boolean_type: BuiltinType::U8,
            size_of_type: BuiltinType::I32,
            exit_code_type: BuiltinType::I32,
            pointer_size: 4,
            optimizations: OptimizationFlags::default(),
        }
    }
}

impl CompilerSettings {
    /// Settings with every optimization disabled.
    pub fn unoptimized() -> Self {
        Self {
            optimizations: OptimizationFlags::empty(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn optimizes(&self, flag: OptimizationFlags) -> bool {
        self.optimizations.contains(flag)
    }

    /// Unsigned integer kind with the width of a pointer.
    pub fn pointer_integer(&self) -> BuiltinType {
        crate::BitWidth::from_bytes(self.pointer_size)
            .map(|width| BuiltinType::integer(width, false))
            .unwrap_or(BuiltinType::U32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_everything() {
        let settings = CompilerSettings::default();
        assert!(settings.optimizes(OptimizationFlags::FUNCTION_INLINING));
        assert!(!CompilerSettings::unoptimized().optimizes(OptimizationFlags::TRIM_UNREACHABLE));
    }

    #[test]
    fn pointer_integer_follows_pointer_size() {
        let mut settings = CompilerSettings::default();
        assert_eq!(settings.pointer_integer(), BuiltinType::U32);
        settings.pointer_size = 8;
        assert_eq!(settings.pointer_integer(), BuiltinType::U64);
    }
}
