//! Toroidal neighbourhood grid for cellular mating.
//!
//! A population of size P is laid out row-major on a grid with
//! `columns = floor(sqrt(P))`. When P is not a multiple of `columns` the last
//! row is short. West/east wrap within a row's actual length, and north/south
//! skip over the short row for columns it lacks. Every column is therefore a
//! closed cycle over the rows that contain it, so each index is exactly one
//! other index's north and exactly one other index's south.
//!
//! Diagonals are derived from the cardinal links (e.g. NW = west of north) and
//! never computed on their own.

use crate::schema::NeighbourhoodShape;

const NORTH: usize = 0;
const SOUTH: usize = 1;
const EAST: usize = 2;
const WEST: usize = 3;
const NORTH_WEST: usize = 4;
const SOUTH_WEST: usize = 5;
const NORTH_EAST: usize = 6;
const SOUTH_EAST: usize = 7;

/// Precomputed neighbour table for one population size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighbourhoodGrid {
    population_size: usize,
    columns: usize,
    rows: usize,
    /// [N, S, E, W, NW, SW, NE, SE] per index.
    links: Vec<[usize; 8]>,
}

impl NeighbourhoodGrid {
    /// Build the grid for `population_size` individuals.
    pub fn new(population_size: usize) -> Self {
        if population_size == 0 {
            return Self {
                population_size: 0,
                columns: 0,
                rows: 0,
                links: Vec::new(),
            };
        }

        let columns = population_size.isqrt();
        let rows = population_size.div_ceil(columns);
        let mut grid = Self {
            population_size,
            columns,
            rows,
            links: Vec::with_capacity(population_size),
        };

        for index in 0..population_size {
            let north = grid.north_of(index);
            let south = grid.south_of(index);
            let east = grid.east_of(index);
            let west = grid.west_of(index);
            grid.links.push([
                north,
                south,
                east,
                west,
                grid.west_of(north),
                grid.west_of(south),
                grid.east_of(north),
                grid.east_of(south),
            ]);
        }

        grid
    }

    pub fn population_size(&self) -> usize {
        self.population_size
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Neighbour indices of `index` for `shape`, as a fresh vector.
    ///
    /// Returns an empty vector for an out-of-range index.
    pub fn neighbours(&self, index: usize, shape: NeighbourhoodShape) -> Vec<usize> {
        if index >= self.population_size {
            return Vec::new();
        }
        match shape {
            NeighbourhoodShape::Ring => self.ring(index),
            NeighbourhoodShape::LinearFive => self.linear_five(index),
            NeighbourhoodShape::CompactNine => self.compact_nine(index),
            NeighbourhoodShape::CompactThirteen => self.compact_thirteen(index),
        }
    }

    /// {left, self, right} in population order.
    fn ring(&self, index: usize) -> Vec<usize> {
        let p = self.population_size;
        vec![(index + p - 1) % p, index, (index + 1) % p]
    }

    /// {N, S, E, W, self}.
    fn linear_five(&self, index: usize) -> Vec<usize> {
        let l = &self.links[index];
        vec![l[NORTH], l[SOUTH], l[EAST], l[WEST], index]
    }

    /// Linear five plus {NW, SW, NE, SE}.
    fn compact_nine(&self, index: usize) -> Vec<usize> {
        let l = &self.links[index];
        let mut members = self.linear_five(index);
        members.extend([l[NORTH_WEST], l[SOUTH_WEST], l[NORTH_EAST], l[SOUTH_EAST]]);
        members
    }

    /// Compact nine plus {NN, SS, EE, WW}.
    fn compact_thirteen(&self, index: usize) -> Vec<usize> {
        let l = &self.links[index];
        let mut members = self.compact_nine(index);
        members.extend([
            self.links[l[NORTH]][NORTH],
            self.links[l[SOUTH]][SOUTH],
            self.links[l[EAST]][EAST],
            self.links[l[WEST]][WEST],
        ]);
        members
    }

    fn row_len(&self, row: usize) -> usize {
        (self.population_size - row * self.columns).min(self.columns)
    }

    fn west_of(&self, index: usize) -> usize {
        let (row, col) = (index / self.columns, index % self.columns);
        let len = self.row_len(row);
        row * self.columns + (col + len - 1) % len
    }

    fn east_of(&self, index: usize) -> usize {
        let (row, col) = (index / self.columns, index % self.columns);
        let len = self.row_len(row);
        row * self.columns + (col + 1) % len
    }

    fn north_of(&self, index: usize) -> usize {
        let (mut row, col) = (index / self.columns, index % self.columns);
        loop {
            row = (row + self.rows - 1) % self.rows;
            if col < self.row_len(row) {
                return row * self.columns + col;
            }
        }
    }

    fn south_of(&self, index: usize) -> usize {
        let (mut row, col) = (index / self.columns, index % self.columns);
        loop {
            row = (row + 1) % self.rows;
            if col < self.row_len(row) {
                return row * self.columns + col;
            }
        }
    }
}
