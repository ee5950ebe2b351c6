use std::{collections::VecDeque, sync::OnceLock};

use super::{
    operation::EdgeOp,
    types::{Colorspace, MatrixCoefficients, TransferCharacteristics, ALL_MATRICES, ALL_PRIMARIES, ALL_TRANSFERS},
};
use crate::{illegal_argument_error, internal_error, Result};

type Edge = (usize, EdgeOp);

/// Static graph over every valid colorspace; edges are the atomic
/// conversions. Shortest operation sequences are found by BFS.
struct ColorspaceGraph {
    vertices: Vec<Colorspace>,
    edges: Vec<Vec<Edge>>,
}

impl ColorspaceGraph {
    fn new() -> Self {
        let mut vertices = Vec::new();

        for matrix in ALL_MATRICES {
            for transfer in ALL_TRANSFERS {
                for primaries in ALL_PRIMARIES {
                    let csp = Colorspace::new(matrix, transfer, primaries);
                    if csp.is_valid() {
                        vertices.push(csp);
                    }
                }
            }
        }

        let mut graph = Self {
            edges: vec![Vec::new(); vertices.len()],
            vertices,
        };
        graph.build_edges();
        graph
    }

    fn index_of(&self, csp: &Colorspace) -> Option<usize> {
        self.vertices.iter().position(|v| v == csp)
    }

    fn link(&mut self, from: &Colorspace, to: &Colorspace, op: EdgeOp) {
        let from = self.index_of(from).expect("colorspace not present in graph");
        let to = self.index_of(to).expect("colorspace not present in graph");

        self.edges[from].push((to, op));
    }

    fn build_edges(&mut self) {
        for csp in self.vertices.clone() {
            if csp.matrix == MatrixCoefficients::Rgb {
                // RGB can be matrixed to any YUV system.
                for matrix in ALL_MATRICES {
                    if matrix == MatrixCoefficients::Bt2020Cl && csp.transfer == TransferCharacteristics::Linear {
                        // Only linear RGB can be encoded as constant luminance.
                        self.link(
                            &csp,
                            &csp.with_matrix(matrix).with_transfer(TransferCharacteristics::Bt709),
                            EdgeOp::Cl2020RgbToYuv,
                        );
                    } else if matrix != MatrixCoefficients::Rgb && matrix != MatrixCoefficients::Bt2020Cl {
                        self.link(&csp, &csp.with_matrix(matrix), EdgeOp::NclRgbToYuv(matrix));
                    }
                }

                if csp.transfer == TransferCharacteristics::Linear {
                    // Linear RGB can change transfer or primaries.
                    for transfer in ALL_TRANSFERS {
                        if transfer != csp.transfer {
                            self.link(&csp, &csp.with_transfer(transfer), EdgeOp::LinearToGamma(transfer));
                        }
                    }
                    for primaries in ALL_PRIMARIES {
                        if primaries != csp.primaries {
                            self.link(&csp, &csp.with_primaries(primaries), EdgeOp::Gamut(csp.primaries, primaries));
                        }
                    }
                } else {
                    self.link(&csp, &csp.to_linear(), EdgeOp::GammaToLinear(csp.transfer));
                }
            } else {
                // YUV can only be converted to its RGB form.
                if csp.matrix == MatrixCoefficients::Bt2020Cl {
                    self.link(&csp, &csp.to_rgb().to_linear(), EdgeOp::Cl2020YuvToRgb);
                } else {
                    self.link(&csp, &csp.to_rgb(), EdgeOp::NclYuvToRgb(csp.matrix));
                }
            }
        }
    }

    fn bfs(&self, from: usize, to: usize) -> Result<Vec<EdgeOp>> {
        let mut queue = VecDeque::new();
        let mut visited = vec![false; self.vertices.len()];
        let mut parents = vec![usize::MAX; self.vertices.len()];

        visited[from] = true;
        queue.push_back(from);

        while let Some(vertex) = queue.pop_front() {
            if vertex == to {
                let mut path = Vec::new();
                let mut tail = vertex;

                while tail != from {
                    let prev = parents[tail];
                    let op = self.edges[prev].iter().find(|e| e.0 == tail).map(|e| e.1);
                    path.insert(0, op.ok_or_else(|| internal_error!("broken path in colorspace graph"))?);
                    tail = prev;
                }
                return Ok(path);
            }

            for &(adj, _) in &self.edges[vertex] {
                if !visited[adj] {
                    visited[adj] = true;
                    parents[adj] = vertex;
                    queue.push_back(adj);
                }
            }
        }

        Err(unsupported_no_path())
    }

    fn shortest_path(&self, from: &Colorspace, to: &Colorspace) -> Result<Vec<EdgeOp>> {
        let from = self.index_of(from).ok_or_else(|| illegal_argument_error!("invalid colorspace definition"))?;
        let to = self.index_of(to).ok_or_else(|| illegal_argument_error!("invalid colorspace definition"))?;

        self.bfs(from, to)
    }
}

fn unsupported_no_path() -> crate::error::Error {
    crate::unsupported_error!("no conversion between colorspaces")
}

static GRAPH: OnceLock<ColorspaceGraph> = OnceLock::new();

/// Shortest sequence of operations converting `from` into `to`.
pub(crate) fn operation_path(from: &Colorspace, to: &Colorspace) -> Result<Vec<EdgeOp>> {
    GRAPH.get_or_init(ColorspaceGraph::new).shortest_path(from, to)
}
