//! Fabric topology trampolines.

use std::sync::Arc;

use accel_api::*;

use super::route;
use crate::builder::LoaderTable;
use crate::context::LoaderContext;
use crate::fanout::{enumerate_one, fan_out, wrap_output};

// ── Fabric vertex ───────────────────────────────────────────

impl LoaderContext {
    /// Like `device_get`, a null driver handle enumerates across every
    /// driver instance.
    pub(crate) fn fabric_vertex_get(
        &self,
        driver: DriverHandle,
        count: &mut u32,
        vertices: Option<&mut [FabricVertexHandle]>,
    ) -> Result<(), ZeResult> {
        if driver.is_null() {
            let instances = self.native_driver_instances()?;
            return fan_out(
                &instances,
                count,
                vertices,
                &self.factories.fabric_vertex,
                |(drv, native), n, out| match drv.dispatch.entry(|t| t.fabric_vertex.get.clone()) {
                    Ok(get) => get(*native, n, out),
                    Err(code) => code,
                },
                |(drv, _)| Arc::clone(&drv.dispatch),
            );
        }

        let (driver, dispatch) = self.factories.driver.unwrap(driver)?;
        let pfn = dispatch.entry(|t| t.fabric_vertex.get.clone())?;
        enumerate_one(count, vertices, &self.factories.fabric_vertex, &dispatch, |n, out| {
            pfn(driver, n, out)
        })
    }

    pub(crate) fn fabric_vertex_get_sub_vertices(
        &self,
        vertex: FabricVertexHandle,
        count: &mut u32,
        sub_vertices: Option<&mut [FabricVertexHandle]>,
    ) -> Result<(), ZeResult> {
        let (vertex, dispatch) = self.factories.fabric_vertex.unwrap(vertex)?;
        let pfn = dispatch.entry(|t| t.fabric_vertex.get_sub_vertices.clone())?;
        enumerate_one(count, sub_vertices, &self.factories.fabric_vertex, &dispatch, |n, out| {
            pfn(vertex, n, out)
        })
    }

    pub(crate) fn fabric_vertex_get_properties(
        &self,
        vertex: FabricVertexHandle,
        properties: &mut FabricVertexProperties,
    ) -> Result<(), ZeResult> {
        let (vertex, dispatch) = self.factories.fabric_vertex.unwrap(vertex)?;
        let pfn = dispatch.entry(|t| t.fabric_vertex.get_properties.clone())?;
        pfn(vertex, properties).check()
    }

    pub(crate) fn fabric_vertex_get_device(
        &self,
        vertex: FabricVertexHandle,
        device: &mut DeviceHandle,
    ) -> Result<(), ZeResult> {
        let (vertex, dispatch) = self.factories.fabric_vertex.unwrap(vertex)?;
        let pfn = dispatch.entry(|t| t.fabric_vertex.get_device.clone())?;
        pfn(vertex, device).check()?;
        wrap_output(&self.factories.device, device, &dispatch)
    }
}

impl LoaderTable for FabricVertexDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        FabricVertexDdi {
            get: route!(ctx, fabric_vertex_get, |
                driver: DriverHandle,
                count: &mut u32,
                vertices: Option<&mut [FabricVertexHandle]>,
            |),
            get_sub_vertices: route!(ctx, fabric_vertex_get_sub_vertices, |
                vertex: FabricVertexHandle,
                count: &mut u32,
                sub_vertices: Option<&mut [FabricVertexHandle]>,
            |),
            get_properties: route!(ctx, fabric_vertex_get_properties, |
                vertex: FabricVertexHandle,
                properties: &mut FabricVertexProperties,
            |),
            get_device: route!(ctx, fabric_vertex_get_device, |
                vertex: FabricVertexHandle,
                device: &mut DeviceHandle,
            |),
        }
    }
}

// ── Fabric edge ─────────────────────────────────────────────

impl LoaderContext {
    pub(crate) fn fabric_edge_get(
        &self,
        vertex_a: FabricVertexHandle,
        vertex_b: FabricVertexHandle,
        count: &mut u32,
        edges: Option<&mut [FabricEdgeHandle]>,
    ) -> Result<(), ZeResult> {
        let (vertex_a, dispatch) = self.factories.fabric_vertex.unwrap(vertex_a)?;
        let (vertex_b, _) = self.factories.fabric_vertex.unwrap(vertex_b)?;
        let pfn = dispatch.entry(|t| t.fabric_edge.get.clone())?;
        enumerate_one(count, edges, &self.factories.fabric_edge, &dispatch, |n, out| {
            pfn(vertex_a, vertex_b, n, out)
        })
    }

    pub(crate) fn fabric_edge_get_vertices(
        &self,
        edge: FabricEdgeHandle,
        vertex_a: &mut FabricVertexHandle,
        vertex_b: &mut FabricVertexHandle,
    ) -> Result<(), ZeResult> {
        let (edge, dispatch) = self.factories.fabric_edge.unwrap(edge)?;
        let pfn = dispatch.entry(|t| t.fabric_edge.get_vertices.clone())?;
        pfn(edge, vertex_a, vertex_b).check()?;
        wrap_output(&self.factories.fabric_vertex, vertex_a, &dispatch)?;
        if let Err(code) = wrap_output(&self.factories.fabric_vertex, vertex_b, &dispatch) {
            let _ = self.factories.fabric_vertex.release(*vertex_a);
            *vertex_a = FabricVertexHandle::NULL;
            return Err(code);
        }
        Ok(())
    }

    pub(crate) fn fabric_edge_get_properties(
        &self,
        edge: FabricEdgeHandle,
        properties: &mut FabricEdgeProperties,
    ) -> Result<(), ZeResult> {
        let (edge, dispatch) = self.factories.fabric_edge.unwrap(edge)?;
        let pfn = dispatch.entry(|t| t.fabric_edge.get_properties.clone())?;
        pfn(edge, properties).check()
    }
}

impl LoaderTable for FabricEdgeDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        FabricEdgeDdi {
            get: route!(ctx, fabric_edge_get, |
                vertex_a: FabricVertexHandle,
                vertex_b: FabricVertexHandle,
                count: &mut u32,
                edges: Option<&mut [FabricEdgeHandle]>,
            |),
            get_vertices: route!(ctx, fabric_edge_get_vertices, |
                edge: FabricEdgeHandle,
                vertex_a: &mut FabricVertexHandle,
                vertex_b: &mut FabricVertexHandle,
            |),
            get_properties: route!(ctx, fabric_edge_get_properties, |
                edge: FabricEdgeHandle,
                properties: &mut FabricEdgeProperties,
            |),
        }
    }
}
