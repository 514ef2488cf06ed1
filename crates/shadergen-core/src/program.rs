//! The program model: functions, uniforms and dependencies of one stage.

use num_derive::FromPrimitive;
use tracing::debug;

use crate::{
    error::Result, AtomKind, ConstantType, Content, Function, FunctionAtom, FunctionId,
    FunctionType, ParamId, ParamRef, Parameter, Semantic, ShaderError, ShaderLanguage,
    UniformId, UniformParameter,
};

/// Pipeline stage a program runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive)]
pub enum GpuProgramType {
    Vertex = 0,
    Fragment = 1,
    Geometry = 2,
    Hull = 3,
    Domain = 4,
    Compute = 5,
}

impl GpuProgramType {
    pub const COUNT: usize = 6;

    pub const ALL: [GpuProgramType; Self::COUNT] = [
        GpuProgramType::Vertex,
        GpuProgramType::Fragment,
        GpuProgramType::Geometry,
        GpuProgramType::Hull,
        GpuProgramType::Domain,
        GpuProgramType::Compute,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GpuProgramType::Vertex => "vertex",
            GpuProgramType::Fragment => "fragment",
            GpuProgramType::Geometry => "geometry",
            GpuProgramType::Hull => "hull",
            GpuProgramType::Domain => "domain",
            GpuProgramType::Compute => "compute",
        }
    }

    /// Slot in per-stage arrays.
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Input,
    Output,
    Local,
}

/// Language-independent description of one shader stage.
///
/// Parameters of every function live in a single arena addressed by
/// [`ParamId`]; uniforms have their own list addressed by [`UniformId`].
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    name: String,
    language: ShaderLanguage,
    program_type: GpuProgramType,
    functions: Vec<Function>,
    params: Vec<Parameter>,
    uniforms: Vec<UniformParameter>,
    dependencies: Vec<String>,
}

impl Program {
    pub fn new(
        name: impl Into<String>,
        language: ShaderLanguage,
        program_type: GpuProgramType,
    ) -> Self {
        Self {
            name: name.into(),
            language,
            program_type,
            functions: Vec::new(),
            params: Vec::new(),
            uniforms: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> ShaderLanguage {
        self.language
    }

    pub fn program_type(&self) -> GpuProgramType {
        self.program_type
    }

    // ----------------------------------------------------------------------
    // Dependencies and uniforms
    // ----------------------------------------------------------------------

    /// Register a source-file dependency. Repeated names are kept once.
    pub fn add_dependency(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.dependencies.contains(&name) {
            self.dependencies.push(name);
        }
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn add_uniform(&mut self, parameter: Parameter, index: i32) -> Result<UniformId> {
        if self.uniform_by_name(parameter.name()).is_some() {
            return Err(ShaderError::DuplicateParameter {
                name: parameter.name().to_owned(),
                scope: format!("uniforms of '{}'", self.name),
            });
        }
        self.uniforms.push(UniformParameter::new(parameter, index));
        Ok(UniformId(self.uniforms.len() - 1))
    }

    pub fn uniforms(&self) -> &[UniformParameter] {
        &self.uniforms
    }

    pub fn uniform(&self, id: UniformId) -> &UniformParameter {
        &self.uniforms[id.0]
    }

    pub fn uniform_by_name(&self, name: &str) -> Option<UniformId> {
        self.uniforms
            .iter()
            .position(|u| u.name() == name)
            .map(UniformId)
    }

    // ----------------------------------------------------------------------
    // Functions
    // ----------------------------------------------------------------------

    pub fn create_function(
        &mut self,
        name: impl Into<String>,
        ty: FunctionType,
    ) -> Result<FunctionId> {
        let name = name.into();
        if self.functions.iter().any(|f| f.name == name) {
            return Err(ShaderError::InvalidProgram(format!(
                "function '{name}' declared twice in '{}'",
                self.name
            )));
        }
        self.functions.push(Function::new(name, ty));
        Ok(FunctionId(self.functions.len() - 1))
    }

    /// Functions in creation order.
    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FunctionId(i), f))
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.0]
    }

    /// The main function of this program, if one was created.
    pub fn entry_function(&self) -> Option<FunctionId> {
        self.functions
            .iter()
            .position(|f| f.ty.is_main())
            .map(FunctionId)
    }

    pub fn add_input(&mut self, function: FunctionId, parameter: Parameter) -> Result<ParamId> {
        self.add_param(function, Scope::Input, parameter)
    }

    pub fn add_output(&mut self, function: FunctionId, parameter: Parameter) -> Result<ParamId> {
        self.add_param(function, Scope::Output, parameter)
    }

    pub fn add_local(&mut self, function: FunctionId, parameter: Parameter) -> Result<ParamId> {
        self.add_param(function, Scope::Local, parameter)
    }

    pub fn add_atom(&mut self, function: FunctionId, atom: FunctionAtom) {
        self.functions[function.0].atoms.push(atom);
    }

    /// Convenience for [`AtomKind::Invoke`] atoms.
    pub fn add_call(
        &mut self,
        function: FunctionId,
        group_order: i32,
        callee: impl Into<String>,
        operands: Vec<crate::Operand>,
    ) {
        self.add_atom(
            function,
            FunctionAtom::new(
                group_order,
                AtomKind::Invoke {
                    function: callee.into(),
                    operands,
                },
            ),
        );
    }

    fn add_param(
        &mut self,
        function: FunctionId,
        scope: Scope,
        parameter: Parameter,
    ) -> Result<ParamId> {
        let f = &self.functions[function.0];
        // In and out live in separate namespaces (separate structs or
        // qualifiers); locals must not shadow either.
        let clashes = |ids: &[ParamId]| ids.iter().any(|id| self.params[id.0].name() == parameter.name());
        let duplicate = match scope {
            Scope::Input => clashes(&f.inputs) || clashes(&f.locals),
            Scope::Output => clashes(&f.outputs) || clashes(&f.locals),
            Scope::Local => clashes(&f.inputs) || clashes(&f.outputs) || clashes(&f.locals),
        };
        if duplicate {
            return Err(ShaderError::DuplicateParameter {
                name: parameter.name().to_owned(),
                scope: format!("function '{}'", f.name),
            });
        }

        self.params.push(parameter);
        let id = ParamId(self.params.len() - 1);
        let f = &mut self.functions[function.0];
        match scope {
            Scope::Input => f.inputs.push(id),
            Scope::Output => f.outputs.push(id),
            Scope::Local => f.locals.push(id),
        }
        Ok(id)
    }

    // ----------------------------------------------------------------------
    // Parameters
    // ----------------------------------------------------------------------

    pub fn param(&self, id: ParamId) -> &Parameter {
        &self.params[id.0]
    }

    pub fn param_mut(&mut self, id: ParamId) -> &mut Parameter {
        &mut self.params[id.0]
    }

    /// Parameter an operand reference points at.
    pub fn resolve_ref(&self, param: ParamRef) -> &Parameter {
        match param {
            ParamRef::Uniform(id) => self.uniform(id),
            ParamRef::Function(id) => self.param(id),
        }
    }

    /// Assign (or clear) the struct name the given parameters are nested in.
    pub fn set_parent_name(&mut self, ids: &[ParamId], parent: Option<&str>) {
        for id in ids {
            self.params[id.0].set_parent_name(parent);
        }
    }

    /// Input of `function` carrying `content`, created on first request.
    pub fn resolve_input(
        &mut self,
        function: FunctionId,
        content: Content,
        ty: ConstantType,
    ) -> Result<ParamId> {
        self.resolve_io(function, Scope::Input, content, ty)
    }

    /// Output of `function` carrying `content`, created on first request.
    pub fn resolve_output(
        &mut self,
        function: FunctionId,
        content: Content,
        ty: ConstantType,
    ) -> Result<ParamId> {
        self.resolve_io(function, Scope::Output, content, ty)
    }

    fn resolve_io(
        &mut self,
        function: FunctionId,
        scope: Scope,
        content: Content,
        ty: ConstantType,
    ) -> Result<ParamId> {
        let f = &self.functions[function.0];
        let (list, prefix) = if scope == Scope::Input {
            (&f.inputs, 'i')
        } else {
            (&f.outputs, 'o')
        };

        if content != Content::Unknown {
            if let Some(&id) = list.iter().find(|id| self.params[id.0].content() == content) {
                return Ok(id);
            }
        }

        let (semantic, index) = content.default_semantic().unwrap_or_else(|| {
            let next = list
                .iter()
                .map(|id| &self.params[id.0])
                .filter(|p| p.semantic() == Semantic::TextureCoordinates)
                .map(|p| p.semantic_index() + 1)
                .max()
                .unwrap_or(0);
            (Semantic::TextureCoordinates, next)
        });
        let name = format!("{prefix}{}_{}", content.stem(), list.len());
        debug!(program = %self.name, %name, ?content, "implicit parameter");

        let parameter = Parameter::new(name, ty)
            .with_semantic(semantic, index)
            .with_content(content);
        self.add_param(function, scope, parameter)
    }

    /// Check that exactly one main function exists and that it matches the
    /// program type.
    pub fn validate(&self) -> Result<()> {
        let mains: Vec<_> = self.functions.iter().filter(|f| f.ty.is_main()).collect();
        match mains.as_slice() {
            [main] if main.ty.program_type() == Some(self.program_type) => Ok(()),
            [main] => Err(ShaderError::InvalidProgram(format!(
                "entry point '{}' of '{}' is {:?}, expected a {} main",
                main.name,
                self.name,
                main.ty,
                self.program_type.name()
            ))),
            [] => Err(ShaderError::InvalidProgram(format!(
                "'{}' has no entry point",
                self.name
            ))),
            _ => Err(ShaderError::InvalidProgram(format!(
                "'{}' has {} entry points",
                self.name,
                mains.len()
            ))),
        }
    }
}

/// Make the consumer's entry inputs mirror the producer's entry outputs.
///
/// Outputs are matched to inputs by content tag, falling back to name for
/// untagged parameters. Matched inputs take the output's name, type and
/// semantic; unmatched outputs become new inputs.
pub fn match_stage_interface(producer: &Program, consumer: &mut Program) -> Result<()> {
    let out_fn = producer
        .entry_function()
        .ok_or_else(|| ShaderError::InvalidProgram(format!("'{}' has no entry point", producer.name)))?;
    let in_fn = consumer
        .entry_function()
        .ok_or_else(|| ShaderError::InvalidProgram(format!("'{}' has no entry point", consumer.name)))?;

    for &out_id in producer.function(out_fn).outputs() {
        let output = producer.param(out_id);
        if output.content().is_struct_marker() {
            continue;
        }
        let existing = consumer.function(in_fn).inputs().iter().copied().find(|&id| {
            let input = consumer.param(id);
            if output.content() != Content::Unknown {
                input.content() == output.content()
            } else {
                input.content() == Content::Unknown && input.name() == output.name()
            }
        });

        let mut mirrored = output.clone();
        mirrored.set_parent_name(None);
        match existing {
            Some(id) => *consumer.param_mut(id) = mirrored,
            None => {
                consumer.add_input(in_fn, mirrored)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex_program() -> (Program, FunctionId) {
        let mut program = Program::new("vs", ShaderLanguage::Hlsl, GpuProgramType::Vertex);
        let main = program.create_function("main", FunctionType::VertexMain).unwrap();
        (program, main)
    }

    #[test]
    fn duplicate_names_are_rejected_per_scope() {
        let (mut program, main) = vertex_program();
        program
            .add_input(main, Parameter::new("position", ConstantType::Float3))
            .unwrap();
        program
            .add_output(main, Parameter::new("position", ConstantType::Float4))
            .unwrap();
        let err = program
            .add_input(main, Parameter::new("position", ConstantType::Float4))
            .unwrap_err();
        assert!(matches!(err, ShaderError::DuplicateParameter { .. }));
        assert!(program
            .add_local(main, Parameter::new("position", ConstantType::Float4))
            .is_err());
        assert!(program
            .add_uniform(Parameter::new("world", ConstantType::Matrix4x4), 0)
            .is_ok());
        assert!(program
            .add_uniform(Parameter::new("world", ConstantType::Matrix4x4), 1)
            .is_err());
    }

    #[test]
    fn resolve_reuses_and_names_by_content() {
        let (mut program, main) = vertex_program();
        let pos = program
            .resolve_input(main, Content::PositionObjectSpace, ConstantType::Float4)
            .unwrap();
        let again = program
            .resolve_input(main, Content::PositionObjectSpace, ConstantType::Float4)
            .unwrap();
        assert_eq!(pos, again);
        assert_eq!(program.param(pos).name(), "iPos_Obj_0");
        assert_eq!(program.param(pos).semantic(), Semantic::Position);

        let world = program
            .resolve_output(main, Content::PositionWorldSpace, ConstantType::Float3)
            .unwrap();
        let view = program
            .resolve_output(main, Content::NormalViewSpace, ConstantType::Float3)
            .unwrap();
        assert_eq!(program.param(world).name(), "oPos_World_0");
        assert_eq!(program.param(world).semantic_index(), 0);
        assert_eq!(program.param(view).semantic(), Semantic::TextureCoordinates);
        assert_eq!(program.param(view).semantic_index(), 1);
    }

    #[test]
    fn validate_requires_one_matching_main() {
        let mut program = Program::new("ps", ShaderLanguage::Glsl, GpuProgramType::Fragment);
        assert!(program.validate().is_err());
        program.create_function("helper", FunctionType::Internal).unwrap();
        program.create_function("main", FunctionType::VertexMain).unwrap();
        assert!(program.validate().is_err());

        let mut program = Program::new("ps", ShaderLanguage::Glsl, GpuProgramType::Fragment);
        program.create_function("main", FunctionType::PixelMain).unwrap();
        assert!(program.validate().is_ok());
        program.create_function("main2", FunctionType::PixelMain).unwrap();
        assert!(program.validate().is_err());
    }

    #[test]
    fn dependencies_are_deduplicated() {
        let (mut program, _) = vertex_program();
        program.add_dependency("Common");
        program.add_dependency("Lighting");
        program.add_dependency("Common");
        assert_eq!(program.dependencies(), ["Common", "Lighting"]);
    }

    #[test]
    fn stage_interface_mirrors_outputs() {
        let (mut vs, vs_main) = vertex_program();
        vs.resolve_output(vs_main, Content::TextureCoordinate(0), ConstantType::Float2)
            .unwrap();
        vs.add_output(vs_main, Parameter::new("fog", ConstantType::Float1))
            .unwrap();

        let mut ps = Program::new("ps", ShaderLanguage::Hlsl, GpuProgramType::Fragment);
        let ps_main = ps.create_function("main", FunctionType::PixelMain).unwrap();
        let uv = ps
            .resolve_input(ps_main, Content::TextureCoordinate(0), ConstantType::Float4)
            .unwrap();

        match_stage_interface(&vs, &mut ps).unwrap();
        let inputs = ps.function(ps_main).inputs();
        assert_eq!(inputs.len(), 2);
        assert_eq!(ps.param(uv).name(), "oTexCoord_0");
        assert_eq!(ps.param(uv).ty(), ConstantType::Float2);
        assert_eq!(ps.param(inputs[1]).name(), "fog");
    }
}
