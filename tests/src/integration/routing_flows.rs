//! # Single Broker Routing
//!
//! Ingress and component events through one broker to connected replicas.
//!
//! ```text
//! ingress ──HTTP──→ broker b1 ──group──→ cart r1
//! checkout r1 ──gRPC──→ broker b1 ──route──→ cart r1 ──reply──→ checkout r1
//! ```

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use kf_04_orchestrator::Receiver;
    use kf_05_durable_transport::InMemoryTransport;
    use shared_types::{event_type, Category, Component, ErrorKind, Event, Val};
    use std::sync::Arc;
    use std::time::Duration;

    const BROKER: &str = "b1";

    async fn broker() -> (TestBroker, Arc<InMemoryTransport>) {
        let transport = Arc::new(InMemoryTransport::new());
        let broker = TestBroker::start(BROKER, resources(), transport.clone()).await;
        (broker, transport)
    }

    fn checkout_r1() -> Component {
        Component::new("checkout", CHECKOUT_HASH)
            .with_id("r1")
            .with_broker(BROKER)
    }

    #[tokio::test]
    async fn test_http_request_reaches_cart_replica() {
        let (broker, _) = broker().await;
        let mut cart = broker.connect("cart", CART_HASH, "r1", true).await;

        broker
            .service
            .send_and_wait(ingress(BROKER, "GET", "/cart/42"), Receiver::HttpServer)
            .await
            .unwrap();

        let matched = next_delivery(&mut cart).await;
        assert_eq!(matched.route_id, 0);
        assert_eq!(matched.event.param("id"), Some(&Val::from("42")));
        let ctx = matched.event.context.as_ref().unwrap();
        assert_eq!(ctx.release_manifest, "rel-1");
        // Genesis events see the release's data.
        assert_eq!(matched.env.get("region"), Some(&Val::from("us")));
    }

    #[tokio::test]
    async fn test_method_selects_between_components() {
        let (broker, _) = broker().await;
        let mut cart = broker.connect("cart", CART_HASH, "r1", true).await;
        let mut checkout = broker.connect("checkout", CHECKOUT_HASH, "r1", true).await;

        broker
            .service
            .send_and_wait(ingress(BROKER, "POST", "/cart/7"), Receiver::HttpServer)
            .await
            .unwrap();

        let matched = next_delivery(&mut checkout).await;
        assert_eq!(matched.event.target.as_ref().unwrap().name, "checkout");
        assert!(matched.env.is_empty());
        assert!(cart.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_component_request_and_reply() {
        let (broker, _) = broker().await;
        let mut cart = broker.connect("cart", CART_HASH, "r1", true).await;
        let mut checkout = broker.connect("checkout", CHECKOUT_HASH, "r1", false).await;

        let mut request = ingress(BROKER, "GET", "/cart/5");
        request.source = Some(checkout_r1());
        request.context = Some(shop_context());
        broker
            .service
            .send_and_wait(request.clone(), Receiver::GrpcServer)
            .await
            .unwrap();

        let matched = next_delivery(&mut cart).await;
        assert_eq!(matched.event.id, request.id);
        // Requests in a deployment context see the environment's data.
        assert_eq!(matched.env.get("region"), Some(&Val::from("eu")));

        let replica = cart_replica(&matched.event);
        let mut reply = Event::new_response(&matched.event, event_type::HTTP);
        reply.source = Some(replica);
        reply.set_status_code(200);
        broker
            .service
            .send_and_wait(reply, Receiver::GrpcServer)
            .await
            .unwrap();

        let response = next_delivery(&mut checkout).await;
        assert_eq!(response.event.category, Category::Response);
        assert_eq!(response.event.parent_id, request.id);
        assert_eq!(response.event.status_code(), 200);
    }

    /// The replica that received `evt`, as it names itself in a reply.
    fn cart_replica(evt: &Event) -> Component {
        let target = evt.target.clone().unwrap();
        Component::new(target.name, target.hash)
            .with_id("r1")
            .with_broker(BROKER)
    }

    #[tokio::test]
    async fn test_unmatched_request_is_route_not_found() {
        let (broker, transport) = broker().await;
        let _cart = broker.connect("cart", CART_HASH, "r1", true).await;

        let err = broker
            .service
            .send_and_wait(ingress(BROKER, "GET", "/orders/1"), Receiver::HttpServer)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RouteNotFound);
        assert_eq!(transport.published(), 0);
    }

    #[tokio::test]
    async fn test_disconnected_group_falls_back_to_transport() {
        let (broker, transport) = broker().await;
        let _cart = broker.connect("cart", CART_HASH, "r1", true).await;
        broker
            .service
            .registry()
            .cancel(&Component::new("cart", CART_HASH).with_id("r1"), None);

        broker
            .service
            .send_and_wait(ingress(BROKER, "GET", "/cart/1"), Receiver::HttpServer)
            .await
            .unwrap();
        assert_eq!(transport.published(), 1);
    }

    #[tokio::test]
    async fn test_expired_request_not_delivered() {
        let (broker, _) = broker().await;
        let mut cart = broker.connect("cart", CART_HASH, "r1", true).await;

        let mut evt = ingress(BROKER, "GET", "/cart/1");
        evt.ttl = 0;
        let err = broker
            .service
            .send_and_wait(evt, Receiver::HttpServer)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cart.try_recv().is_err());
    }
}
