//! Output-shape rules for the operators the graph builder emits.
//!
//! RULES:
//!   - Elementwise binary: numpy broadcasting
//!   - dense: [.., K] x [N, K] -> [.., N]
//!   - bias_add: bias length must match the channel axis
//!   - conv2d: [N, C, H, W] -> [N, C_out, H_out, W_out]
//!   - conv2d_transpose: [N, C_in, H, W] -> [N, C_out, H_up, W_up]
//!   - max/avg pool: window with stride and padding
//!   - adaptive pool: fixed spatial output
//!   - flatten: [N, ...] -> [N, prod(...)]
//!   - concatenate: sum along the axis, other dims must agree

use crate::asg::Shape;
use crate::tensor::{BuildError, BuildResult};

/// Spatial window parameters shared by convolution and pooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub kernel: (usize, usize),
    pub stride: (usize, usize),
    pub padding: (usize, usize),
    pub dilation: (usize, usize),
}

impl Window {
    pub fn new(kernel: (usize, usize), stride: (usize, usize), padding: (usize, usize)) -> Self {
        Self { kernel, stride, padding, dilation: (1, 1) }
    }
}

fn expect_rank(op: &str, shape: &[usize], rank: usize) -> BuildResult<()> {
    if shape.len() != rank {
        return Err(BuildError::InvalidRank {
            op: op.to_string(),
            expected: rank,
            actual: shape.len(),
        });
    }
    Ok(())
}

fn incompatible(op: &str, lhs: &[usize], rhs: &[usize]) -> BuildError {
    BuildError::IncompatibleShapes {
        op: op.to_string(),
        shape1: lhs.to_vec(),
        shape2: rhs.to_vec(),
    }
}

pub fn broadcast(op: &str, lhs: &[usize], rhs: &[usize]) -> BuildResult<Shape> {
    let rank = lhs.len().max(rhs.len());
    let mut out = vec![0; rank];
    for i in 0..rank {
        let l = if i < rank - lhs.len() { 1 } else { lhs[i - (rank - lhs.len())] };
        let r = if i < rank - rhs.len() { 1 } else { rhs[i - (rank - rhs.len())] };
        out[i] = match (l, r) {
            (a, b) if a == b => a,
            (1, b) => b,
            (a, 1) => a,
            _ => return Err(incompatible(op, lhs, rhs)),
        };
    }
    Ok(out)
}

pub fn dense(data: &[usize], weight: &[usize]) -> BuildResult<Shape> {
    expect_rank("dense", weight, 2)?;
    match data.last() {
        Some(&k) if k == weight[1] => {
            let mut out = data[..data.len() - 1].to_vec();
            out.push(weight[0]);
            Ok(out)
        }
        _ => Err(incompatible("dense", data, weight)),
    }
}

pub fn bias_add(data: &[usize], bias: &[usize], axis: usize) -> BuildResult<Shape> {
    expect_rank("bias_add", bias, 1)?;
    match data.get(axis) {
        Some(&c) if c == bias[0] => Ok(data.to_vec()),
        _ => Err(incompatible("bias_add", data, bias)),
    }
}

fn window_extent(op: &str, size: usize, kernel: usize, stride: usize, pad: usize, dilation: usize) -> BuildResult<usize> {
    let padded = size + 2 * pad;
    if kernel == 0 || stride == 0 || padded < (kernel - 1) * dilation + 1 {
        return Err(BuildError::WindowTooLarge { op: op.to_string(), kernel, size: padded });
    }
    Ok((padded - ((kernel - 1) * dilation + 1)) / stride + 1)
}

/// `weight` is `[C_out, C_in / groups, kH, kW]`.
pub fn conv2d(data: &[usize], weight: &[usize], window: &Window, groups: usize) -> BuildResult<Shape> {
    expect_rank("conv2d", data, 4)?;
    expect_rank("conv2d", weight, 4)?;
    if groups == 0 || data[1] != weight[1] * groups {
        return Err(incompatible("conv2d", data, weight));
    }
    let h = window_extent("conv2d", data[2], weight[2], window.stride.0, window.padding.0, window.dilation.0)?;
    let w = window_extent("conv2d", data[3], weight[3], window.stride.1, window.padding.1, window.dilation.1)?;
    Ok(vec![data[0], weight[0], h, w])
}

/// `weight` is `[C_in, C_out, kH, kW]`.
pub fn conv2d_transpose(
    data: &[usize],
    weight: &[usize],
    window: &Window,
    output_padding: (usize, usize),
) -> BuildResult<Shape> {
    expect_rank("conv2d_transpose", data, 4)?;
    expect_rank("conv2d_transpose", weight, 4)?;
    if data[1] != weight[0] {
        return Err(incompatible("conv2d_transpose", data, weight));
    }
    let upsample = |size: usize, kernel: usize, stride: usize, pad: usize, dilation: usize, extra: usize| {
        let too_small = BuildError::WindowTooLarge { op: "conv2d_transpose".to_string(), kernel, size };
        if size == 0 || kernel == 0 {
            return Err(too_small);
        }
        let full = (size as i64 - 1) * stride as i64 + (dilation * (kernel - 1)) as i64 + extra as i64 + 1;
        let out = full - 2 * pad as i64;
        if out <= 0 {
            return Err(too_small);
        }
        Ok(out as usize)
    };
    let h = upsample(data[2], weight[2], window.stride.0, window.padding.0, window.dilation.0, output_padding.0)?;
    let w = upsample(data[3], weight[3], window.stride.1, window.padding.1, window.dilation.1, output_padding.1)?;
    Ok(vec![data[0], weight[1], h, w])
}

pub fn pool2d(op: &str, data: &[usize], window: &Window) -> BuildResult<Shape> {
    expect_rank(op, data, 4)?;
    let h = window_extent(op, data[2], window.kernel.0, window.stride.0, window.padding.0, 1)?;
    let w = window_extent(op, data[3], window.kernel.1, window.stride.1, window.padding.1, 1)?;
    Ok(vec![data[0], data[1], h, w])
}

pub fn adaptive_pool2d(data: &[usize], output_size: (usize, usize)) -> BuildResult<Shape> {
    expect_rank("adaptive_avg_pool2d", data, 4)?;
    Ok(vec![data[0], data[1], output_size.0, output_size.1])
}

pub fn flatten(data: &[usize]) -> BuildResult<Shape> {
    match data.split_first() {
        Some((&n, rest)) => Ok(vec![n, rest.iter().product()]),
        None => Err(BuildError::InvalidRank { op: "batch_flatten".to_string(), expected: 1, actual: 0 }),
    }
}

pub fn reshape(data: &[usize], target: &[usize]) -> BuildResult<Shape> {
    if data.iter().product::<usize>() != target.iter().product::<usize>() {
        return Err(incompatible("reshape", data, target));
    }
    Ok(target.to_vec())
}

pub fn concatenate(inputs: &[&[usize]], axis: usize) -> BuildResult<Shape> {
    let (first, rest) = inputs.split_first().ok_or(BuildError::EmptyConcat)?;
    if axis >= first.len() {
        return Err(BuildError::InvalidRank { op: "concatenate".to_string(), expected: axis + 1, actual: first.len() });
    }
    let mut out = first.to_vec();
    for shape in rest {
        let agrees = shape.len() == first.len()
            && shape.iter().zip(first.iter()).enumerate().all(|(i, (a, b))| i == axis || a == b);
        if !agrees {
            return Err(incompatible("concatenate", first, shape));
        }
        out[axis] += shape[axis];
    }
    Ok(out)
}
