mod test_driver_guided;
mod test_driver_regular;
mod test_mesh_sanity;
