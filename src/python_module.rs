//! Python bindings for password-filters using PyO3

use crate::bloom::BloomFilter;
use crate::file::{FileAllocator, FileStorage, MutableFileStorage};
use crate::params::{populate_options, BloomOptions};
use crate::storage::{BufferAllocator, BufferStorage};
use crate::FilterError;
use numpy::{IntoPyArray, PyArray1};
use pyo3::exceptions::{PyIOError, PyTypeError, PyValueError};
use pyo3::prelude::*;

fn to_py_err(e: FilterError) -> PyErr {
    match e {
        FilterError::Io(e) => PyIOError::new_err(e.to_string()),
        e => PyValueError::new_err(e.to_string()),
    }
}

enum Inner {
    Memory(BloomFilter<BufferStorage>),
    File(BloomFilter<MutableFileStorage>),
    ReadOnly(BloomFilter<FileStorage>),
}

/// Dispatch a read-only call to whichever storage backs the filter
macro_rules! with_filter {
    ($inner:expr, $f:ident => $body:expr) => {
        match $inner {
            Inner::Memory($f) => $body,
            Inner::File($f) => $body,
            Inner::ReadOnly($f) => $body,
        }
    };
}

/// Python wrapper for BloomFilter
#[pyclass(name = "BloomFilter")]
struct PyBloomFilter {
    inner: Inner,
}

#[pymethods]
impl PyBloomFilter {
    /// Create a filter in memory, or in a new file when `path` is given
    #[new]
    #[pyo3(signature = (m=None, k=None, n=None, epsilon=None, path=None))]
    fn new(
        m: Option<u64>,
        k: Option<u32>,
        n: Option<u64>,
        epsilon: Option<f64>,
        path: Option<String>,
    ) -> PyResult<Self> {
        let options = BloomOptions { m, k, n, epsilon };
        let inner = match path {
            Some(path) => Inner::File(
                BloomFilter::create(&options, &FileAllocator::new(path)).map_err(to_py_err)?,
            ),
            None => Inner::Memory(
                BloomFilter::create(&options, &BufferAllocator).map_err(to_py_err)?,
            ),
        };
        Ok(PyBloomFilter { inner })
    }

    /// Open an existing filter file read-only
    #[staticmethod]
    fn open(path: String) -> PyResult<Self> {
        let storage = FileStorage::open(path).map_err(to_py_err)?;
        let filter = BloomFilter::open(storage).map_err(to_py_err)?;
        Ok(PyBloomFilter {
            inner: Inner::ReadOnly(filter),
        })
    }

    fn add(&mut self, element: &[u8]) -> PyResult<()> {
        match &mut self.inner {
            Inner::Memory(filter) => filter.add(element).map_err(to_py_err),
            Inner::File(filter) => filter.add(element).map_err(to_py_err),
            Inner::ReadOnly(_) => Err(PyTypeError::new_err("filter was opened read-only")),
        }
    }

    fn has(&self, element: &[u8]) -> PyResult<bool> {
        with_filter!(&self.inner, filter => filter.has(element).map_err(to_py_err))
    }

    /// Membership of many elements at once, as a numpy bool array
    fn has_many<'py>(&self, py: Python<'py>, elements: Vec<Vec<u8>>) -> PyResult<&'py PyArray1<bool>> {
        let results = elements
            .iter()
            .map(|element| with_filter!(&self.inner, filter => filter.has(element)))
            .collect::<Result<Vec<bool>, _>>()
            .map_err(to_py_err)?;
        Ok(results.into_pyarray(py))
    }

    fn epsilon(&self) -> f64 {
        with_filter!(&self.inner, filter => filter.epsilon())
    }

    #[getter]
    fn m(&self) -> u64 {
        with_filter!(&self.inner, filter => filter.m())
    }

    #[getter]
    fn k(&self) -> u8 {
        with_filter!(&self.inner, filter => filter.k())
    }

    #[getter]
    fn n(&self) -> u64 {
        with_filter!(&self.inner, filter => filter.n())
    }

    /// Raw filter bytes (header and bit array) of an in-memory filter
    fn to_bytes(&self) -> PyResult<Vec<u8>> {
        match &self.inner {
            Inner::Memory(filter) => Ok(filter.storage().as_bytes().to_vec()),
            _ => Err(PyTypeError::new_err("only in-memory filters can be exported")),
        }
    }

    fn stats(&self) -> PyResult<String> {
        let stats = with_filter!(&self.inner, filter => filter.stats()).map_err(to_py_err)?;
        Ok(stats.to_string())
    }

    fn __len__(&self) -> usize {
        self.n() as usize
    }

    fn __contains__(&self, element: &[u8]) -> PyResult<bool> {
        self.has(element)
    }

    fn __repr__(&self) -> String {
        format!(
            "BloomFilter(m={}, k={}, n={}, epsilon={:.6})",
            self.m(),
            self.k(),
            self.n(),
            self.epsilon()
        )
    }
}

/// Resolve partial parameters into (m, k, n, epsilon)
#[pyfunction]
#[pyo3(signature = (m=None, k=None, n=None, epsilon=None))]
fn tune(
    m: Option<u64>,
    k: Option<u32>,
    n: Option<u64>,
    epsilon: Option<f64>,
) -> PyResult<(u64, u8, Option<u64>, Option<f64>)> {
    let params = populate_options(&BloomOptions { m, k, n, epsilon }).map_err(to_py_err)?;
    Ok((params.m, params.k, params.n, params.epsilon))
}

/// Python module definition
#[pymodule]
fn password_filters(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyBloomFilter>()?;
    m.add_function(wrap_pyfunction!(tune, m)?)?;

    // Add module constants
    m.add("HEADER_SIZE", crate::bloom::HEADER_SIZE)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
