//! Named constant definitions and their per-type buffer layout.

use std::collections::BTreeMap;

use shadergen_core::{BufferClass, ConstantType, Program, ShaderLanguage};
use tracing::{debug, trace};

/// Where and how a named constant is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantDefinition {
    pub const_type: ConstantType,
    pub array_size: usize,
    /// Sequential slot of the constant within its stage.
    pub logical_index: usize,
    /// Byte offset into the buffer of the constant's [`BufferClass`].
    pub physical_index: usize,
    /// Size of one element in 4-byte units.
    pub element_size: usize,
}

impl ConstantDefinition {
    pub fn buffer_class(&self) -> BufferClass {
        self.const_type.buffer_class()
    }

    /// Total size in 4-byte units.
    pub fn size(&self) -> usize {
        self.array_size * self.element_size
    }
}

/// The constants of one stage, allocated into flat float/double/int/uint
/// buffers.
///
/// Allocation is an arena per buffer class: each definition takes the next
/// free offset in its buffer and offsets never move.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GpuNamedConstants {
    definitions: BTreeMap<String, ConstantDefinition>,
    pad_to_4: bool,
    float_size: usize,
    double_size: usize,
    int_size: usize,
    uint_size: usize,
    next_logical: usize,
}

impl GpuNamedConstants {
    /// `pad_to_4` rounds every vector and matrix row up to a full register.
    pub fn new(pad_to_4: bool) -> Self {
        Self {
            pad_to_4,
            ..Default::default()
        }
    }

    /// Define a constant. Redefining an existing name keeps the first
    /// definition; struct markers and unknown types are not stored.
    pub fn define(
        &mut self,
        name: &str,
        const_type: ConstantType,
        array_size: usize,
    ) -> Option<&ConstantDefinition> {
        if self.definitions.contains_key(name) {
            debug!(%name, "constant already defined");
            return self.definitions.get(name);
        }

        let element_size = const_type.element_size(self.pad_to_4);
        let cursor = match const_type.buffer_class() {
            BufferClass::Float => &mut self.float_size,
            BufferClass::Double => &mut self.double_size,
            BufferClass::Int => &mut self.int_size,
            BufferClass::UInt => &mut self.uint_size,
            BufferClass::None => return None,
        };
        let array_size = array_size.max(1);
        let definition = ConstantDefinition {
            const_type,
            array_size,
            logical_index: self.next_logical,
            physical_index: *cursor * 4,
            element_size,
        };
        *cursor += definition.size();
        self.next_logical += 1;

        trace!(%name, ?definition, "defined constant");
        let stored: &ConstantDefinition = self
            .definitions
            .entry(name.to_owned())
            .or_insert(definition);
        Some(stored)
    }

    pub fn get(&self, name: &str) -> Option<&ConstantDefinition> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Definitions ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConstantDefinition)> {
        self.definitions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Total size of a buffer in 4-byte units.
    pub fn buffer_size(&self, class: BufferClass) -> usize {
        match class {
            BufferClass::Float => self.float_size,
            BufferClass::Double => self.double_size,
            BufferClass::Int => self.int_size,
            BufferClass::UInt => self.uint_size,
            BufferClass::None => 0,
        }
    }

    /// Definitions for every uniform of a program model, in declaration order.
    pub fn from_program(program: &Program) -> Self {
        let mut constants = Self::new(program.language() == ShaderLanguage::Hlsl);
        for uniform in program.uniforms() {
            constants.define(uniform.name(), uniform.ty(), uniform.array_size());
        }
        constants
    }

    /// Definitions for the default-block `uniform` declarations of GLSL
    /// source.
    ///
    /// Block bodies, function bodies and preprocessor lines are skipped.
    /// Declarations of types GLSL does not name are ignored.
    pub fn from_glsl_source(source: &str) -> Self {
        let mut constants = Self::new(false);
        for statement in top_level_statements(&strip_comments(source)) {
            parse_uniform_statement(&statement, &mut constants);
        }
        constants
    }
}

// ---------------------------------------------------------------------------
// GLSL declaration scanning
// ---------------------------------------------------------------------------

const SKIPPED_QUALIFIERS: &[&str] = &[
    "lowp", "mediump", "highp", "precise", "invariant", "coherent", "volatile", "restrict",
    "readonly", "writeonly",
];

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Split source into `;`-terminated statements outside of any braces.
fn top_level_statements(source: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for line in source.lines() {
        if line.trim_start().starts_with('#') {
            continue;
        }
        for c in line.chars().chain(std::iter::once('\n')) {
            match c {
                '{' => {
                    if depth == 0 {
                        current.clear();
                    }
                    depth += 1;
                }
                '}' => depth = depth.saturating_sub(1),
                ';' if depth == 0 => statements.push(std::mem::take(&mut current)),
                _ if depth == 0 => current.push(c),
                _ => {}
            }
        }
    }
    statements
}

/// Remove every `layout(...)` qualifier.
fn strip_layout(statement: &str) -> String {
    let mut out = String::with_capacity(statement.len());
    let mut rest = statement;
    while let Some(pos) = rest.find("layout") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + "layout".len()..];
        let trimmed = after.trim_start();
        match (trimmed.starts_with('('), trimmed.find(')')) {
            (true, Some(close)) => rest = &trimmed[close + 1..],
            _ => {
                out.push_str("layout");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn parse_uniform_statement(statement: &str, constants: &mut GpuNamedConstants) {
    let statement = strip_layout(statement);
    let mut tokens = statement.split_whitespace();
    if tokens.next() != Some("uniform") {
        return;
    }
    let Some(type_name) = tokens.find(|t| !SKIPPED_QUALIFIERS.contains(t)) else {
        return;
    };
    let Some(const_type) = ShaderLanguage::Glsl.parse_type(type_name) else {
        debug!(%type_name, "skipping uniform of unrecognised type");
        return;
    };

    let declarators = tokens.collect::<Vec<_>>().join(" ");
    for declarator in declarators.split(',') {
        let declarator = declarator.split('=').next().unwrap_or_default().trim();
        let (name, dims) = match declarator.find('[') {
            Some(open) => (declarator[..open].trim(), &declarator[open..]),
            None => (declarator, ""),
        };
        if name.is_empty() {
            continue;
        }
        let array_size = dims
            .split(|c: char| c == '[' || c == ']')
            .filter_map(|d| d.trim().parse::<usize>().ok())
            .product::<usize>();
        constants.define(name, const_type, array_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadergen_core::{GpuProgramType, Parameter};

    #[test]
    fn arena_offsets_per_buffer_class() {
        let mut c = GpuNamedConstants::new(false);
        let world = *c.define("world", ConstantType::Matrix4x4, 1).unwrap();
        let count = *c.define("count", ConstantType::Int1, 1).unwrap();
        let colour = *c.define("colour", ConstantType::Float3, 2).unwrap();
        let map = *c.define("map", ConstantType::Sampler2D, 1).unwrap();

        assert_eq!(world.physical_index, 0);
        assert_eq!(colour.physical_index, 16 * 4);
        assert_eq!(count.physical_index, 0);
        assert_eq!(map.physical_index, 4);
        assert_eq!(
            [world, count, colour, map].map(|d| d.logical_index),
            [0, 1, 2, 3]
        );
        assert_eq!(c.buffer_size(BufferClass::Float), 16 + 6);
        assert_eq!(c.buffer_size(BufferClass::Int), 2);
    }

    #[test]
    fn buffer_sizes_equal_sum_of_definitions() {
        let mut c = GpuNamedConstants::new(true);
        c.define("a", ConstantType::Float1, 3);
        c.define("b", ConstantType::Matrix3x4, 1);
        c.define("c", ConstantType::Double2, 2);
        c.define("d", ConstantType::UInt3, 1);
        c.define("e", ConstantType::AtomicCounter, 1);
        for class in [
            BufferClass::Float,
            BufferClass::Double,
            BufferClass::Int,
            BufferClass::UInt,
        ] {
            let sum: usize = c
                .iter()
                .filter(|(_, d)| d.buffer_class() == class)
                .map(|(_, d)| d.size())
                .sum();
            assert_eq!(sum, c.buffer_size(class), "{class:?}");
        }
    }

    #[test]
    fn redefinition_and_markers() {
        let mut c = GpuNamedConstants::new(false);
        c.define("x", ConstantType::Float4, 1);
        let again = *c.define("x", ConstantType::Float1, 8).unwrap();
        assert_eq!(again.const_type, ConstantType::Float4);
        assert!(c.define("IN", ConstantType::ShaderIn, 1).is_none());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn from_program_uses_uniform_arrays() {
        let mut program = Program::new("ps", ShaderLanguage::Hlsl, GpuProgramType::Fragment);
        let lights = Parameter::new("lightColor", ConstantType::Float4)
            .with_array_dims(&[3])
            .unwrap();
        program.add_uniform(lights, 0).unwrap();
        program
            .add_uniform(Parameter::new("gain", ConstantType::Float1), 3)
            .unwrap();
        let c = GpuNamedConstants::from_program(&program);
        assert_eq!(c.get("lightColor").unwrap().array_size, 3);
        // padded: float1 occupies a full register
        assert_eq!(c.get("gain").unwrap().element_size, 4);
        assert_eq!(c.get("gain").unwrap().physical_index, 12 * 4);
    }

    #[test]
    fn scans_glsl_uniform_declarations() {
        let source = r#"
#version 430
// uniform vec4 commented;
layout(std140, binding = 0) uniform Camera {
    mat4 view;
    mat4 proj;
} camera;
layout(binding = 2) uniform sampler2D diffuseMap;
uniform highp vec4 lightColor[3], ambient;
uniform mat3x3 normalMatrix; /* uniform float hidden; */
uniform float weights[2][4] = float[2][4](0.0);
uniform Unknown thing;
void main() {
    uniform_calls();
}
"#;
        let c = GpuNamedConstants::from_glsl_source(source);
        let names: Vec<_> = c.iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            ["ambient", "diffuseMap", "lightColor", "normalMatrix", "weights"]
        );
        assert_eq!(c.get("lightColor").unwrap().array_size, 3);
        assert_eq!(c.get("weights").unwrap().array_size, 8);
        assert_eq!(c.get("normalMatrix").unwrap().const_type, ConstantType::Matrix3x3);
        assert_eq!(c.get("diffuseMap").unwrap().const_type, ConstantType::Sampler2D);
    }
}
