pub mod tinylfu;
