pub mod keyed_mutex;
