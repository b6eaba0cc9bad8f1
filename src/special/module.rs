//! Ops bound to their data, re-runnable without arguments.
//!
//! Iteration drivers and pipelines hold a [`Module`] and call `run()`; the
//! module feeds the bound inputs to the op and writes the bound output. When
//! no output was bound the first `run()` lets the op allocate it, and later
//! runs compute into that cached output.

use crate::core::error::OpResult;
use crate::special::{BinaryHybridCF, OpHandle, UnaryHybridCF};

/// Something that can be re-invoked with the data bound to it.
pub trait Module {
    fn run(&mut self) -> OpResult<()>;
}

/// A unary hybrid op bound to an input and an optional output.
pub struct UnaryModule<I: 'static, O: 'static> {
    op: OpHandle<dyn UnaryHybridCF<I, O>>,
    input: I,
    output: Option<O>,
}

impl<I: 'static, O: 'static> UnaryModule<I, O> {
    /// Bind `input`; the output is allocated on first run.
    pub fn new(op: OpHandle<dyn UnaryHybridCF<I, O>>, input: I) -> Self {
        Self {
            op,
            input,
            output: None,
        }
    }

    /// Bind a caller-supplied output.
    pub fn with_output(mut self, output: O) -> Self {
        self.output = Some(output);
        self
    }

    /// Replace the bound input.
    pub fn set_input(&mut self, input: I) {
        self.input = input;
    }

    /// The bound input.
    pub fn input(&self) -> &I {
        &self.input
    }

    /// The output, once bound or allocated.
    pub fn output(&self) -> Option<&O> {
        self.output.as_ref()
    }

    /// Take the output out of the module.
    pub fn take_output(&mut self) -> Option<O> {
        self.output.take()
    }
}

impl<I: 'static, O: 'static> Module for UnaryModule<I, O> {
    fn run(&mut self) -> OpResult<()> {
        match self.output.as_mut() {
            Some(output) => self.op.compute1(&self.input, output),
            None => {
                self.output = Some(self.op.calculate1(&self.input)?);
                Ok(())
            }
        }
    }
}

/// A binary hybrid op bound to two inputs and an optional output.
pub struct BinaryModule<I1: 'static, I2: 'static, O: 'static> {
    op: OpHandle<dyn BinaryHybridCF<I1, I2, O>>,
    in1: I1,
    in2: I2,
    output: Option<O>,
}

impl<I1: 'static, I2: 'static, O: 'static> BinaryModule<I1, I2, O> {
    /// Bind both inputs; the output is allocated on first run.
    pub fn new(op: OpHandle<dyn BinaryHybridCF<I1, I2, O>>, in1: I1, in2: I2) -> Self {
        Self {
            op,
            in1,
            in2,
            output: None,
        }
    }

    /// Bind a caller-supplied output.
    pub fn with_output(mut self, output: O) -> Self {
        self.output = Some(output);
        self
    }

    /// Replace the bound inputs.
    pub fn set_inputs(&mut self, in1: I1, in2: I2) {
        self.in1 = in1;
        self.in2 = in2;
    }

    /// The output, once bound or allocated.
    pub fn output(&self) -> Option<&O> {
        self.output.as_ref()
    }

    /// Take the output out of the module.
    pub fn take_output(&mut self) -> Option<O> {
        self.output.take()
    }
}

impl<I1: 'static, I2: 'static, O: 'static> Module for BinaryModule<I1, I2, O> {
    fn run(&mut self) -> OpResult<()> {
        match self.output.as_mut() {
            Some(output) => self.op.compute2(&self.in1, &self.in2, output),
            None => {
                self.output = Some(self.op.calculate2(&self.in1, &self.in2)?);
                Ok(())
            }
        }
    }
}
