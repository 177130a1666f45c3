use ndarray::prelude::*;

/// Objective function that counts how often this process called it.
pub struct WrappedFunction<F: Fn(ArrayView1<f64>) -> f64> {
    pub num: usize,
    pub func: F,
}

impl<F: Fn(ArrayView1<f64>) -> f64> WrappedFunction<F> {
    pub fn new(func: F) -> Self {
        WrappedFunction { num: 0, func }
    }

    pub fn call(&mut self, arg: ArrayView1<f64>) -> f64 {
        self.num += 1;
        (self.func)(arg)
    }
}
