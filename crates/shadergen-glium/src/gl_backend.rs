//! Raw OpenGL implementation of [`NativeBackend`].

use std::{
    ffi::{c_void, CString},
    ptr,
    sync::Once,
};

use gl::types::{GLchar, GLenum, GLint, GLsizei, GLsizeiptr, GLuint};
use gpu_program::{
    ActiveBlock, ActiveUniform, AtomicSlot, BlockKind, BufferHandle, DriverLog, NativeBackend,
    ProgramBinary, ProgramHandle, StageHandle,
};
use shadergen_core::{ConstantType, GpuProgramType};
use tracing::{debug, trace};

use crate::gl_state::log_gl_errors;

pub(crate) static GL_INIT_ONCE: Once = Once::new();

/// Compiles, links and reflects programs in the current OpenGL context.
#[derive(Debug)]
pub struct GlBackend {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl GlBackend {
    /// Create a backend for the context current on this thread.
    ///
    /// GL function pointers are loaded exactly once via `gl_loader`.
    ///
    /// # Safety
    ///
    /// An OpenGL 3.0+ context must be current on this thread for as long as
    /// the backend is used. Using it outside that context will cause
    /// undefined behavior.
    pub unsafe fn new() -> Self {
        GL_INIT_ONCE.call_once(|| {
            gl_loader::init_gl();
            gl::load_with(|s| gl_loader::get_proc_address(s).cast());
        });

        Self {
            _not_send: std::marker::PhantomData,
        }
    }
}

fn shader_kind(stage: GpuProgramType) -> GLenum {
    match stage {
        GpuProgramType::Vertex => gl::VERTEX_SHADER,
        GpuProgramType::Fragment => gl::FRAGMENT_SHADER,
        GpuProgramType::Geometry => gl::GEOMETRY_SHADER,
        GpuProgramType::Hull => gl::TESS_CONTROL_SHADER,
        GpuProgramType::Domain => gl::TESS_EVALUATION_SHADER,
        GpuProgramType::Compute => gl::COMPUTE_SHADER,
    }
}

fn block_buffer_target(kind: BlockKind) -> GLenum {
    match kind {
        BlockKind::Uniform => gl::UNIFORM_BUFFER,
        BlockKind::ShaderStorage => gl::SHADER_STORAGE_BUFFER,
    }
}

/// Constant type of a `glGetActiveUniform` type enum.
pub fn constant_type_from_gl(ty: GLenum) -> ConstantType {
    use ConstantType::*;
    match ty {
        gl::FLOAT => Float1,
        gl::FLOAT_VEC2 => Float2,
        gl::FLOAT_VEC3 => Float3,
        gl::FLOAT_VEC4 => Float4,
        gl::INT | gl::BOOL => Int1,
        gl::INT_VEC2 | gl::BOOL_VEC2 => Int2,
        gl::INT_VEC3 | gl::BOOL_VEC3 => Int3,
        gl::INT_VEC4 | gl::BOOL_VEC4 => Int4,
        gl::UNSIGNED_INT => UInt1,
        gl::UNSIGNED_INT_VEC2 => UInt2,
        gl::UNSIGNED_INT_VEC3 => UInt3,
        gl::UNSIGNED_INT_VEC4 => UInt4,
        gl::DOUBLE => Double1,
        gl::DOUBLE_VEC2 => Double2,
        gl::DOUBLE_VEC3 => Double3,
        gl::DOUBLE_VEC4 => Double4,
        gl::FLOAT_MAT2 => Matrix2x2,
        gl::FLOAT_MAT2x3 => Matrix2x3,
        gl::FLOAT_MAT2x4 => Matrix2x4,
        gl::FLOAT_MAT3x2 => Matrix3x2,
        gl::FLOAT_MAT3 => Matrix3x3,
        gl::FLOAT_MAT3x4 => Matrix3x4,
        gl::FLOAT_MAT4x2 => Matrix4x2,
        gl::FLOAT_MAT4x3 => Matrix4x3,
        gl::FLOAT_MAT4 => Matrix4x4,
        gl::DOUBLE_MAT2 => MatrixDouble2x2,
        gl::DOUBLE_MAT2x3 => MatrixDouble2x3,
        gl::DOUBLE_MAT2x4 => MatrixDouble2x4,
        gl::DOUBLE_MAT3x2 => MatrixDouble3x2,
        gl::DOUBLE_MAT3 => MatrixDouble3x3,
        gl::DOUBLE_MAT3x4 => MatrixDouble3x4,
        gl::DOUBLE_MAT4x2 => MatrixDouble4x2,
        gl::DOUBLE_MAT4x3 => MatrixDouble4x3,
        gl::DOUBLE_MAT4 => MatrixDouble4x4,
        gl::SAMPLER_1D => Sampler1D,
        gl::SAMPLER_2D => Sampler2D,
        gl::SAMPLER_3D => Sampler3D,
        gl::SAMPLER_CUBE => SamplerCube,
        gl::SAMPLER_1D_ARRAY => Sampler1DArray,
        gl::SAMPLER_2D_ARRAY => Sampler2DArray,
        gl::SAMPLER_1D_SHADOW => Sampler1DShadow,
        gl::SAMPLER_2D_SHADOW => Sampler2DShadow,
        gl::IMAGE_1D => Image1D,
        gl::IMAGE_2D => Image2D,
        gl::IMAGE_3D => Image3D,
        gl::IMAGE_CUBE => ImageCube,
        gl::IMAGE_2D_ARRAY => Image2DArray,
        gl::UNSIGNED_INT_ATOMIC_COUNTER => AtomicCounter,
        _ => Unknown,
    }
}

/// # Safety
///
/// `shader` must be a valid shader object of the current context.
unsafe fn shader_info_log(shader: GLuint) -> String {
    let mut len: GLint = 0;
    gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut len);
    let mut buf = vec![0u8; len.max(1) as usize];
    let mut written: GLsizei = 0;
    gl::GetShaderInfoLog(shader, len.max(1), &mut written, buf.as_mut_ptr().cast::<GLchar>());
    buf.truncate(written.max(0) as usize);
    String::from_utf8_lossy(&buf).into_owned()
}

/// # Safety
///
/// `program` must be a valid program object of the current context.
unsafe fn program_info_log(program: GLuint) -> String {
    let mut len: GLint = 0;
    gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut len);
    let mut buf = vec![0u8; len.max(1) as usize];
    let mut written: GLsizei = 0;
    gl::GetProgramInfoLog(program, len.max(1), &mut written, buf.as_mut_ptr().cast::<GLchar>());
    buf.truncate(written.max(0) as usize);
    String::from_utf8_lossy(&buf).into_owned()
}

/// # Safety
///
/// `program` must be a valid program object of the current context.
unsafe fn link_status(program: GLuint) -> bool {
    let mut status: GLint = 0;
    gl::GetProgramiv(program, gl::LINK_STATUS, &mut status);
    status == GLint::from(gl::TRUE)
}

fn name_from_buffer(buf: &[u8], written: GLsizei) -> String {
    let len = (written.max(0) as usize).min(buf.len());
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

impl GlBackend {
    /// # Safety
    ///
    /// `program` must be a linked program of the current context.
    unsafe fn uniform_blocks(&self, program: GLuint) -> Vec<ActiveBlock> {
        let mut count: GLint = 0;
        gl::GetProgramiv(program, gl::ACTIVE_UNIFORM_BLOCKS, &mut count);

        let mut blocks = Vec::with_capacity(count.max(0) as usize);
        for index in 0..count.max(0) as GLuint {
            let mut name_len: GLint = 0;
            gl::GetActiveUniformBlockiv(program, index, gl::UNIFORM_BLOCK_NAME_LENGTH, &mut name_len);
            let mut buf = vec![0u8; name_len.max(1) as usize];
            let mut written: GLsizei = 0;
            gl::GetActiveUniformBlockName(
                program,
                index,
                name_len.max(1),
                &mut written,
                buf.as_mut_ptr().cast::<GLchar>(),
            );
            let mut data_size: GLint = 0;
            gl::GetActiveUniformBlockiv(program, index, gl::UNIFORM_BLOCK_DATA_SIZE, &mut data_size);
            blocks.push(ActiveBlock {
                name: name_from_buffer(&buf, written),
                index,
                data_size: data_size.max(0) as usize,
            });
        }
        blocks
    }

    /// # Safety
    ///
    /// `program` must be a linked program of a 4.3+ context.
    unsafe fn storage_blocks(&self, program: GLuint) -> Vec<ActiveBlock> {
        let mut count: GLint = 0;
        gl::GetProgramInterfaceiv(program, gl::SHADER_STORAGE_BLOCK, gl::ACTIVE_RESOURCES, &mut count);
        let mut max_name: GLint = 0;
        gl::GetProgramInterfaceiv(program, gl::SHADER_STORAGE_BLOCK, gl::MAX_NAME_LENGTH, &mut max_name);

        let mut blocks = Vec::with_capacity(count.max(0) as usize);
        for index in 0..count.max(0) as GLuint {
            let mut buf = vec![0u8; max_name.max(1) as usize];
            let mut written: GLsizei = 0;
            gl::GetProgramResourceName(
                program,
                gl::SHADER_STORAGE_BLOCK,
                index,
                max_name.max(1),
                &mut written,
                buf.as_mut_ptr().cast::<GLchar>(),
            );
            let property = gl::BUFFER_DATA_SIZE;
            let mut data_size: GLint = 0;
            gl::GetProgramResourceiv(
                program,
                gl::SHADER_STORAGE_BLOCK,
                index,
                1,
                &property,
                1,
                ptr::null_mut(),
                &mut data_size,
            );
            blocks.push(ActiveBlock {
                name: name_from_buffer(&buf, written),
                index,
                data_size: data_size.max(0) as usize,
            });
        }
        blocks
    }

    /// # Safety
    ///
    /// `program` must be a linked program of a 4.2+ context and `index` an
    /// active atomic counter uniform.
    unsafe fn atomic_slot(&self, program: GLuint, index: GLuint) -> AtomicSlot {
        let mut buffer_index: GLint = 0;
        gl::GetActiveUniformsiv(
            program,
            1,
            &index,
            gl::UNIFORM_ATOMIC_COUNTER_BUFFER_INDEX,
            &mut buffer_index,
        );
        let mut offset: GLint = 0;
        gl::GetActiveUniformsiv(program, 1, &index, gl::UNIFORM_OFFSET, &mut offset);
        let mut binding: GLint = 0;
        gl::GetActiveAtomicCounterBufferiv(
            program,
            buffer_index.max(0) as GLuint,
            gl::ATOMIC_COUNTER_BUFFER_BINDING,
            &mut binding,
        );
        AtomicSlot {
            binding: binding.max(0) as u32,
            offset: offset.max(0) as u32,
        }
    }
}

impl NativeBackend for GlBackend {
    fn compile(&mut self, stage: GpuProgramType, source: &str) -> Result<StageHandle, DriverLog> {
        let source = CString::new(source)
            .map_err(|_| DriverLog("shader source contains a NUL byte".to_owned()))?;
        unsafe {
            let shader = gl::CreateShader(shader_kind(stage));
            gl::ShaderSource(shader, 1, &source.as_ptr(), ptr::null());
            gl::CompileShader(shader);

            let mut status: GLint = 0;
            gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut status);
            if status != GLint::from(gl::TRUE) {
                let log = shader_info_log(shader);
                gl::DeleteShader(shader);
                return Err(DriverLog(log));
            }
            debug!(stage = stage.name(), shader, "compiled shader");
            Ok(StageHandle(shader))
        }
    }

    fn delete_stage(&mut self, stage: StageHandle) {
        unsafe { gl::DeleteShader(stage.0) };
    }

    fn link(&mut self, stages: &[StageHandle]) -> Result<ProgramHandle, DriverLog> {
        unsafe {
            let program = gl::CreateProgram();
            for stage in stages {
                gl::AttachShader(program, stage.0);
            }
            gl::ProgramParameteri(
                program,
                gl::PROGRAM_BINARY_RETRIEVABLE_HINT,
                GLint::from(gl::TRUE),
            );
            gl::LinkProgram(program);
            for stage in stages {
                gl::DetachShader(program, stage.0);
            }

            if !link_status(program) {
                let log = program_info_log(program);
                gl::DeleteProgram(program);
                return Err(DriverLog(log));
            }
            log_gl_errors("link");
            debug!(program, stages = stages.len(), "linked program");
            Ok(ProgramHandle(program))
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        unsafe { gl::DeleteProgram(program.0) };
    }

    fn active_uniforms(&self, program: ProgramHandle) -> Vec<ActiveUniform> {
        let program = program.0;
        unsafe {
            let mut count: GLint = 0;
            gl::GetProgramiv(program, gl::ACTIVE_UNIFORMS, &mut count);
            let mut max_len: GLint = 0;
            gl::GetProgramiv(program, gl::ACTIVE_UNIFORM_MAX_LENGTH, &mut max_len);

            let mut uniforms = Vec::with_capacity(count.max(0) as usize);
            for index in 0..count.max(0) as GLuint {
                let mut buf = vec![0u8; max_len.max(1) as usize];
                let mut written: GLsizei = 0;
                let mut size: GLint = 0;
                let mut ty: GLenum = 0;
                gl::GetActiveUniform(
                    program,
                    index,
                    max_len.max(1),
                    &mut written,
                    &mut size,
                    &mut ty,
                    buf.as_mut_ptr().cast::<GLchar>(),
                );

                // Block members are reported through their block.
                let mut block_index: GLint = -1;
                gl::GetActiveUniformsiv(program, 1, &index, gl::UNIFORM_BLOCK_INDEX, &mut block_index);
                if block_index != -1 {
                    continue;
                }

                let name = name_from_buffer(&buf, written);
                let (location, atomic) = if ty == gl::UNSIGNED_INT_ATOMIC_COUNTER {
                    (-1, Some(self.atomic_slot(program, index)))
                } else {
                    let location = match CString::new(name.as_str()) {
                        Ok(c_name) => gl::GetUniformLocation(program, c_name.as_ptr()),
                        Err(_) => -1,
                    };
                    (location, None)
                };

                trace!(%name, location, ty, size, "active uniform");
                uniforms.push(ActiveUniform {
                    name,
                    location,
                    ty: constant_type_from_gl(ty),
                    array_size: size.max(1) as usize,
                    atomic,
                });
            }
            uniforms
        }
    }

    fn active_blocks(&self, program: ProgramHandle, kind: BlockKind) -> Vec<ActiveBlock> {
        unsafe {
            match kind {
                BlockKind::Uniform => self.uniform_blocks(program.0),
                BlockKind::ShaderStorage => self.storage_blocks(program.0),
            }
        }
    }

    fn bind_block(&mut self, program: ProgramHandle, kind: BlockKind, block_index: u32, binding: u32) {
        unsafe {
            match kind {
                BlockKind::Uniform => gl::UniformBlockBinding(program.0, block_index, binding),
                BlockKind::ShaderStorage => {
                    gl::ShaderStorageBlockBinding(program.0, block_index, binding)
                }
            }
        }
    }

    fn create_block_buffer(&mut self, kind: BlockKind, binding: u32, size: usize) -> BufferHandle {
        let target = block_buffer_target(kind);
        unsafe {
            let mut buffer: GLuint = 0;
            gl::GenBuffers(1, &mut buffer);
            gl::BindBuffer(target, buffer);
            gl::BufferData(target, size as GLsizeiptr, ptr::null(), gl::DYNAMIC_DRAW);
            gl::BindBufferBase(target, binding, buffer);
            gl::BindBuffer(target, 0);
            log_gl_errors("create block buffer");
            BufferHandle(buffer)
        }
    }

    fn program_binary(&self, program: ProgramHandle) -> Option<ProgramBinary> {
        unsafe {
            let mut len: GLint = 0;
            gl::GetProgramiv(program.0, gl::PROGRAM_BINARY_LENGTH, &mut len);
            if len <= 0 {
                return None;
            }
            let mut data = vec![0u8; len as usize];
            let mut written: GLsizei = 0;
            let mut format: GLenum = 0;
            gl::GetProgramBinary(
                program.0,
                len,
                &mut written,
                &mut format,
                data.as_mut_ptr().cast::<c_void>(),
            );
            if !log_gl_errors("get program binary") || written <= 0 {
                return None;
            }
            data.truncate(written as usize);
            Some(ProgramBinary { format, data })
        }
    }

    fn load_binary(&mut self, binary: &ProgramBinary) -> Result<ProgramHandle, DriverLog> {
        let len = GLsizei::try_from(binary.data.len())
            .map_err(|_| DriverLog("program binary too large".to_owned()))?;
        unsafe {
            let program = gl::CreateProgram();
            gl::ProgramBinary(program, binary.format, binary.data.as_ptr().cast::<c_void>(), len);
            // A rejected format raises GL_INVALID_ENUM and leaves the program unlinked.
            let clean = log_gl_errors("load program binary");
            if !clean || !link_status(program) {
                let log = program_info_log(program);
                gl::DeleteProgram(program);
                return Err(DriverLog(if log.is_empty() {
                    format!("binary format {:#x} rejected", binary.format)
                } else {
                    log
                }));
            }
            Ok(ProgramHandle(program))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gl_types_map_to_constant_types() {
        assert_eq!(constant_type_from_gl(gl::FLOAT_VEC3), ConstantType::Float3);
        assert_eq!(constant_type_from_gl(gl::FLOAT_MAT3x4), ConstantType::Matrix3x4);
        assert_eq!(constant_type_from_gl(gl::BOOL_VEC2), ConstantType::Int2);
        assert_eq!(constant_type_from_gl(gl::SAMPLER_2D_SHADOW), ConstantType::Sampler2DShadow);
        assert_eq!(
            constant_type_from_gl(gl::UNSIGNED_INT_ATOMIC_COUNTER),
            ConstantType::AtomicCounter
        );
        assert_eq!(constant_type_from_gl(gl::SAMPLER_BUFFER), ConstantType::Unknown);
    }

    #[test]
    fn every_stage_has_a_shader_kind() {
        let kinds: Vec<_> = GpuProgramType::ALL.into_iter().map(shader_kind).collect();
        assert_eq!(kinds.len(), 6);
        assert!(kinds.contains(&gl::TESS_CONTROL_SHADER));
    }
}
