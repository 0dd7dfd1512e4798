use ndarray::{Array2, Axis};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::link::{sigmoid, softplus};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Leaf,
    AddRow,
    Sub,
    MatMul,
    Mul,
    Tanh,
    ReLU,
    Softplus,
    Ln,
    Mean,
}

// Inner data structure
struct AutogradData {
    value: Array2<f64>,
    grad: Array2<f64>,
    children: Vec<Autograd>,
    op: Op,
}

/// Node of a reverse-mode computation graph over 2-D arrays.
///
/// Cloning is shallow: clones share value and gradient, which is how
/// parameters are handed to the optimizer.
pub struct Autograd {
    data: Rc<RefCell<AutogradData>>,
}

impl Autograd {
    pub fn new(value: Array2<f64>) -> Self {
        Self {
            data: Rc::new(RefCell::new(AutogradData {
                grad: Array2::zeros(value.raw_dim()),
                value,
                children: Vec::new(),
                op: Op::Leaf,
            })),
        }
    }

    fn from_op(value: Array2<f64>, op: Op, children: Vec<Autograd>) -> Self {
        let result = Autograd::new(value);
        {
            let mut data = result.data.borrow_mut();
            data.op = op;
            data.children = children;
        }
        result
    }

    /// Adds a `(1, m)` row to every row of an `(n, m)` node.
    pub fn add_row(&self, row: &Autograd) -> Autograd {
        let value = &self.data.borrow().value + &row.data.borrow().value;
        Self::from_op(value, Op::AddRow, vec![self.clone(), row.clone()])
    }

    pub fn sub(&self, other: &Autograd) -> Autograd {
        let value = &self.data.borrow().value - &other.data.borrow().value;
        Self::from_op(value, Op::Sub, vec![self.clone(), other.clone()])
    }

    pub fn matmul(&self, other: &Autograd) -> Autograd {
        let value = self.data.borrow().value.dot(&other.data.borrow().value);
        Self::from_op(value, Op::MatMul, vec![self.clone(), other.clone()])
    }

    /// Elementwise product.
    pub fn mul(&self, other: &Autograd) -> Autograd {
        let value = &self.data.borrow().value * &other.data.borrow().value;
        Self::from_op(value, Op::Mul, vec![self.clone(), other.clone()])
    }

    pub fn tanh(&self) -> Autograd {
        let value = self.data.borrow().value.mapv(f64::tanh);
        Self::from_op(value, Op::Tanh, vec![self.clone()])
    }

    pub fn relu(&self) -> Autograd {
        let value = self.data.borrow().value.mapv(|x| x.max(0.0));
        Self::from_op(value, Op::ReLU, vec![self.clone()])
    }

    pub fn softplus(&self) -> Autograd {
        let value = self.data.borrow().value.mapv(softplus);
        Self::from_op(value, Op::Softplus, vec![self.clone()])
    }

    pub fn ln(&self) -> Autograd {
        let value = self.data.borrow().value.mapv(f64::ln);
        Self::from_op(value, Op::Ln, vec![self.clone()])
    }

    /// Mean over every element, as a `(1, 1)` node.
    pub fn mean(&self) -> Autograd {
        let mean = self.data.borrow().value.mean().unwrap_or(f64::NAN);
        Self::from_op(Array2::from_elem((1, 1), mean), Op::Mean, vec![self.clone()])
    }

    fn build_topo(
        &self,
        topo: &mut Vec<Autograd>,
        visited: &mut HashSet<*const RefCell<AutogradData>>,
    ) {
        let ptr = Rc::as_ptr(&self.data);
        if visited.insert(ptr) {
            for child in &self.data.borrow().children {
                child.build_topo(topo, visited);
            }
            topo.push(self.clone());
        }
    }

    /// Seeds this node's gradient with ones and accumulates gradients into
    /// every node it depends on.
    pub fn backward(&self) {
        let mut topo = Vec::new();
        let mut visited = HashSet::new();
        self.build_topo(&mut topo, &mut visited);

        {
            let mut data = self.data.borrow_mut();
            let dim = data.value.raw_dim();
            data.grad = Array2::ones(dim);
        }

        for node in topo.iter().rev() {
            let (value, grad, children, op) = {
                let data = node.data.borrow();
                (
                    data.value.clone(),
                    data.grad.clone(),
                    data.children.clone(),
                    data.op,
                )
            };

            match op {
                Op::Leaf => {}
                Op::AddRow => {
                    // the broadcast row receives the column sums
                    children[0].accumulate(&grad);
                    children[1].accumulate(&grad.sum_axis(Axis(0)).insert_axis(Axis(0)));
                }
                Op::Sub => {
                    children[0].accumulate(&grad);
                    children[1].accumulate(&grad.mapv(|g| -g));
                }
                Op::MatMul => {
                    // y = a b -> da = dy b^T, db = a^T dy
                    let a = children[0].value();
                    let b = children[1].value();
                    children[0].accumulate(&grad.dot(&b.t()));
                    children[1].accumulate(&a.t().dot(&grad));
                }
                Op::Mul => {
                    let a = children[0].value();
                    let b = children[1].value();
                    children[0].accumulate(&(&grad * &b));
                    children[1].accumulate(&(&grad * &a));
                }
                Op::Tanh => {
                    // y = tanh(x) -> dy/dx = 1 - y^2
                    let local = value.mapv(|y| 1.0 - y * y);
                    children[0].accumulate(&(&local * &grad));
                }
                Op::ReLU => {
                    let mask = value.mapv(|y| if y > 0.0 { 1.0 } else { 0.0 });
                    children[0].accumulate(&(&mask * &grad));
                }
                Op::Softplus => {
                    let local = children[0].value().mapv(sigmoid);
                    children[0].accumulate(&(&local * &grad));
                }
                Op::Ln => {
                    let x = children[0].value();
                    children[0].accumulate(&(&grad / &x));
                }
                Op::Mean => {
                    let (rows, cols) = children[0].shape();
                    let n = (rows * cols).max(1) as f64;
                    children[0].accumulate(&Array2::from_elem((rows, cols), grad[[0, 0]] / n));
                }
            }
        }
    }

    fn accumulate(&self, delta: &Array2<f64>) {
        self.data.borrow_mut().grad += delta;
    }

    pub fn zero_grad(&self) {
        let mut data = self.data.borrow_mut();
        let dim = data.value.raw_dim();
        data.grad = Array2::zeros(dim);
    }

    pub fn value(&self) -> Array2<f64> {
        self.data.borrow().value.clone()
    }

    /// First element of the value; the loss of a scalar graph.
    pub fn item(&self) -> f64 {
        self.data.borrow().value.iter().next().copied().unwrap_or(f64::NAN)
    }

    pub fn grad(&self) -> Array2<f64> {
        self.data.borrow().grad.clone()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.borrow().value.dim()
    }

    pub fn set_value(&self, value: Array2<f64>) {
        self.data.borrow_mut().value = value;
    }
}

impl Clone for Autograd {
    fn clone(&self) -> Self {
        Self {
            data: Rc::clone(&self.data),
        }
    }
}

impl std::fmt::Debug for Autograd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data.borrow();
        f.debug_struct("Autograd")
            .field("value", &data.value)
            .field("grad", &data.grad)
            .field("op", &data.op)
            .field("children", &data.children.len())
            .finish()
    }
}
