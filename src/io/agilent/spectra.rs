use indexmap::IndexSet;

use super::scan::channel_mass;

/// Accumulates mass channels in order of first occurrence during a decode pass.
/// Once the pass is done it is frozen into a [`ChannelIndex`].
#[derive(Debug, Default)]
pub(crate) struct ChannelIndexBuilder {
    channels: IndexSet<u16>,
}

impl ChannelIndexBuilder {
    /// Get the column for `channel`, assigning the next free column if it
    /// has not been seen before
    #[inline]
    pub fn column_of(&mut self, channel: u16) -> usize {
        self.channels.insert_full(channel).0
    }

    pub fn freeze(self) -> ChannelIndex {
        ChannelIndex {
            channels: self.channels,
        }
    }
}

/**
The immutable mapping between raw mass channel ids and matrix columns of a
[`SpectralMatrix`]. Columns are numbered in order of first occurrence in the
file.
*/
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelIndex {
    channels: IndexSet<u16>,
}

impl ChannelIndex {
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// The column a raw channel id was assigned, if it was observed
    pub fn column_of(&self, channel: u16) -> Option<usize> {
        self.channels.get_index_of(&channel)
    }

    /// The raw channel id of a column
    pub fn channel_at(&self, column: usize) -> Option<u16> {
        self.channels.get_index(column).copied()
    }

    /// The raw channel ids, in column order
    pub fn channels(&self) -> impl Iterator<Item = u16> + '_ {
        self.channels.iter().copied()
    }

    /// The channel masses in daltons, in column order
    pub fn masses(&self) -> Vec<f64> {
        self.channels.iter().map(|c| channel_mass(*c)).collect()
    }
}

/**
A scan × mass channel intensity matrix stored in compressed sparse row form.

Row `i` covers `column_indices[row_pointers[i]..row_pointers[i + 1]]` and the
matching slice of `values`.
*/
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpectralMatrix {
    /// Retention time of each row, in minutes
    pub times: Vec<f64>,
    pub row_pointers: Vec<usize>,
    pub column_indices: Vec<usize>,
    pub values: Vec<f64>,
    channels: ChannelIndex,
}

/// A dense row-major rendering of a [`SpectralMatrix`]
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DenseSpectra {
    pub times: Vec<f64>,
    pub masses: Vec<f64>,
    /// One row per scan, one column per mass
    pub rows: Vec<Vec<f64>>,
}

impl SpectralMatrix {
    pub(crate) fn from_parts(
        times: Vec<f64>,
        row_pointers: Vec<usize>,
        column_indices: Vec<usize>,
        values: Vec<f64>,
        channels: ChannelIndex,
    ) -> Self {
        debug_assert_eq!(row_pointers.len(), times.len() + 1);
        debug_assert_eq!(column_indices.len(), values.len());
        Self {
            times,
            row_pointers,
            column_indices,
            values,
            channels,
        }
    }

    /// The number of rows (scans)
    pub fn n_rows(&self) -> usize {
        self.times.len()
    }

    /// The number of columns (distinct mass channels)
    pub fn n_columns(&self) -> usize {
        self.channels.len()
    }

    /// The number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn channels(&self) -> &ChannelIndex {
        &self.channels
    }

    pub fn masses(&self) -> Vec<f64> {
        self.channels.masses()
    }

    /// The stored (column, value) entries of a row
    pub fn row(&self, index: usize) -> Option<impl Iterator<Item = (usize, f64)> + '_> {
        let start = *self.row_pointers.get(index)?;
        let end = *self.row_pointers.get(index + 1)?;
        Some(
            self.column_indices[start..end]
                .iter()
                .copied()
                .zip(self.values[start..end].iter().copied()),
        )
    }

    /// Look up a single cell, summing duplicate entries. Cells that were never
    /// stored are zero.
    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        if column >= self.n_columns() {
            return None;
        }
        Some(
            self.row(row)?
                .filter(|(c, _)| *c == column)
                .map(|(_, v)| v)
                .sum(),
        )
    }

    /// Sum each column over all rows, giving the summed spectrum of the run
    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_columns()];
        for (c, v) in self.column_indices.iter().zip(self.values.iter()) {
            sums[*c] += v;
        }
        sums
    }

    /// Extract the intensity of one mass channel over time
    pub fn channel_trace(&self, channel: u16) -> Option<Vec<f64>> {
        let column = self.channels.column_of(channel)?;
        (0..self.n_rows())
            .map(|i| self.get(i, column))
            .collect()
    }

    /// Expand the matrix into dense rows. Duplicate entries are summed.
    pub fn to_dense(&self) -> DenseSpectra {
        let n_columns = self.n_columns();
        let rows = (0..self.n_rows())
            .map(|i| {
                let mut row = vec![0.0; n_columns];
                let start = self.row_pointers[i];
                let end = self.row_pointers[i + 1];
                for (c, v) in self.column_indices[start..end]
                    .iter()
                    .zip(self.values[start..end].iter())
                {
                    row[*c] += v;
                }
                row
            })
            .collect();
        DenseSpectra {
            times: self.times.clone(),
            masses: self.masses(),
            rows,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn small_matrix() -> SpectralMatrix {
        let mut builder = ChannelIndexBuilder::default();
        let mut columns = Vec::new();
        for channel in [1000u16, 1020, 1020, 1040, 1000] {
            columns.push(builder.column_of(channel));
        }
        SpectralMatrix::from_parts(
            vec![1.0, 2.0],
            vec![0, 3, 5],
            columns,
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            builder.freeze(),
        )
    }

    #[test]
    fn test_channel_index_assignment() {
        let matrix = small_matrix();
        assert_eq!(matrix.column_indices, vec![0, 1, 1, 2, 0]);
        assert_eq!(matrix.channels().column_of(1040), Some(2));
        assert_eq!(matrix.channels().channel_at(1), Some(1020));
        assert_eq!(matrix.channels().column_of(999), None);
        assert_eq!(matrix.masses(), vec![50.0, 51.0, 52.0]);
    }

    #[test]
    fn test_dense_sums_duplicates() {
        let matrix = small_matrix();
        let dense = matrix.to_dense();
        assert_eq!(dense.rows, vec![vec![1.0, 5.0, 0.0], vec![5.0, 0.0, 4.0]]);
        assert_eq!(matrix.get(0, 1), Some(5.0));
        assert_eq!(matrix.get(1, 1), Some(0.0));
        assert_eq!(matrix.get(2, 1), None);
        assert_eq!(matrix.column_sums(), vec![6.0, 5.0, 4.0]);
        assert_eq!(matrix.channel_trace(1000), Some(vec![1.0, 5.0]));
    }
}
