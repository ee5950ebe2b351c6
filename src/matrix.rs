/// Row-compressed sparse matrix.
///
/// Each row stores a single contiguous band of entries plus the column offset
/// of the band. `compress` trims leading and trailing zeros only; interior
/// zeros stay resident so bands remain contiguous.
pub(crate) struct RowMatrix {
    storage: Vec<Vec<f64>>,
    offsets: Vec<usize>,
    rows: usize,
    cols: usize,
}

impl RowMatrix {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            storage: vec![Vec::new(); rows],
            offsets: vec![0; rows],
            rows,
            cols,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row_left(&self, i: usize) -> usize {
        self.offsets[i]
    }

    pub fn row_right(&self, i: usize) -> usize {
        self.offsets[i] + self.storage[i].len()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        debug_assert!(i < self.rows && j < self.cols);

        let left = self.row_left(i);
        if j < left || j >= self.row_right(i) {
            0.0
        } else {
            self.storage[i][j - left]
        }
    }

    fn element_mut(&mut self, i: usize, j: usize) -> &mut f64 {
        debug_assert!(i < self.rows && j < self.cols);

        let left = self.row_left(i);
        let right = self.row_right(i);
        let row = &mut self.storage[i];

        if row.is_empty() {
            row.push(0.0);
            self.offsets[i] = j;
        } else if j < left {
            row.splice(0..0, std::iter::repeat(0.0).take(left - j));
            self.offsets[i] = j;
        } else if j >= right {
            row.resize(row.len() + (j - right + 1), 0.0);
        }

        let left = self.offsets[i];
        &mut self.storage[i][j - left]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        if value != self.get(i, j) {
            *self.element_mut(i, j) = value;
        }
    }

    pub fn add(&mut self, i: usize, j: usize, value: f64) {
        let sum = self.get(i, j) + value;
        self.set(i, j, sum);
    }

    pub fn compress(&mut self) {
        for i in 0..self.rows {
            let row = &mut self.storage[i];

            let left = row.iter().position(|&x| x != 0.0);
            match left {
                Some(left) => {
                    let right = row.iter().rposition(|&x| x != 0.0).unwrap() + 1;
                    row.truncate(right);
                    row.drain(..left);
                    self.offsets[i] += left;
                }
                None => {
                    row.clear();
                    self.offsets[i] = 0;
                }
            }
        }
    }

    pub fn transpose(&self) -> RowMatrix {
        let mut m = RowMatrix::new(self.cols, self.rows);

        for i in 0..self.rows {
            for j in self.row_left(i)..self.row_right(i) {
                m.set(j, i, self.get(i, j));
            }
        }

        m.compress();
        m
    }

    pub fn mul(&self, rhs: &RowMatrix) -> RowMatrix {
        debug_assert_eq!(self.cols, rhs.rows);

        let mut m = RowMatrix::new(self.rows, rhs.cols);

        for i in 0..self.rows {
            for j in 0..rhs.cols {
                let mut accum = 0.0;

                for k in self.row_left(i)..self.row_right(i) {
                    accum += self.get(i, k) * rhs.get(k, j);
                }
                m.set(i, j, accum);
            }
        }

        m.compress();
        m
    }
}
